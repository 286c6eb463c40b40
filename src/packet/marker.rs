use std::io;

use bytes::Buf;

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// PGP as UTF-8 octets.
const PGP: [u8; 3] = [0x50, 0x47, 0x50];

/// Marker Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.8>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    packet_header: PacketHeader,
}

impl Marker {
    pub fn new(version: PacketHeaderVersion) -> Self {
        Marker {
            packet_header: PacketHeader::new_for_body(version, Tag::Marker, PGP.len()),
        }
    }

    /// Parses a `Marker` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        input.read_tag(&PGP)?;

        Ok(Marker { packet_header })
    }
}

impl Default for Marker {
    fn default() -> Self {
        Self::new(PacketHeaderVersion::New)
    }
}

impl Serialize for Marker {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&PGP[..])?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        PGP.len()
    }
}

impl PacketTrait for Marker {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_marker() {
        let marker = Marker::default();
        let mut buf = Vec::new();
        marker.to_writer_with_header(&mut buf).unwrap();
        assert_eq!(buf, hex::decode("ca03504750").unwrap());

        let header = PacketHeader::from_buf(&mut &buf[..2]).unwrap();
        assert_eq!(Marker::from_buf(header, &buf[2..]).unwrap(), marker);
    }

    #[test]
    fn test_invalid_marker() {
        let header = PacketHeader::new_fixed(Tag::Marker, 3);
        let err = Marker::from_buf(header, &b"PGX"[..]).unwrap_err();
        assert!(matches!(err, Error::PacketParsing { .. }));
        assert!(Marker::from_buf(header, &b"PG"[..]).unwrap_err().is_incomplete());
    }
}
