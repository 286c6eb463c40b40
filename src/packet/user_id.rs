use std::{io, str};

use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.11>
///
/// The body is kept as raw bytes, it is UTF-8 by convention only.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct UserId {
    packet_header: PacketHeader,
    #[debug("{}", String::from_utf8_lossy(id))]
    id: Bytes,
}

impl UserId {
    /// Parses a `UserId` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let id = input.rest();

        Ok(UserId { packet_header, id })
    }

    /// Create a new `UserId` packet from a string.
    pub fn from_str(version: PacketHeaderVersion, input: &str) -> Self {
        Self::from_bytes(version, Bytes::copy_from_slice(input.as_bytes()))
    }

    pub fn from_bytes(version: PacketHeaderVersion, id: Bytes) -> Self {
        UserId {
            packet_header: PacketHeader::new_for_body(version, Tag::UserId, id.len()),
            id,
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The id as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        Ok(str::from_utf8(&self.id)?)
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

impl PacketTrait for UserId {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_roundtrip() {
        let id = UserId::from_str(PacketHeaderVersion::New, "Hans <hans@example.com>");
        assert_eq!(id.as_str().unwrap(), "Hans <hans@example.com>");

        let body = id.to_bytes().unwrap();
        let back = UserId::from_buf(*id.packet_header(), &body[..]).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_non_utf8() {
        let header = PacketHeader::new_fixed(Tag::UserId, 2);
        let id = UserId::from_buf(header, &[0xff, 0xfe][..]).unwrap();
        assert_eq!(id.id(), &[0xff, 0xfe]);
        assert!(id.as_str().is_err());
    }
}
