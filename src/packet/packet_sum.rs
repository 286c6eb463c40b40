use std::io;

use log::warn;

use crate::errors::Result;
use crate::packet::{
    CompressedData, LiteralData, Marker, PacketHeader, PublicKey,
    PublicKeyEncryptedSessionKey, PublicSubkey, SecretKey, SecretSubkey, Signature,
    SymEncryptedData, SymKeyEncryptedSessionKey, UserId,
};
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Represents a Packet. A packet is the record structure used to encode a chunk of data in OpenPGP.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4>
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    CompressedData(CompressedData),
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    LiteralData(LiteralData),
    Marker(Marker),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedData(SymEncryptedData),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    UserId(UserId),
}

impl_try_from_into!(
    Packet,
    CompressedData => CompressedData,
    PublicKey => PublicKey,
    PublicSubkey => PublicSubkey,
    SecretKey => SecretKey,
    SecretSubkey => SecretSubkey,
    LiteralData => LiteralData,
    Marker => Marker,
    PublicKeyEncryptedSessionKey => PublicKeyEncryptedSessionKey,
    Signature => Signature,
    SymEncryptedData => SymEncryptedData,
    SymKeyEncryptedSessionKey => SymKeyEncryptedSessionKey,
    UserId => UserId
);

macro_rules! for_each_packet {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Packet::CompressedData($p) => $body,
            Packet::PublicKey($p) => $body,
            Packet::PublicSubkey($p) => $body,
            Packet::SecretKey($p) => $body,
            Packet::SecretSubkey($p) => $body,
            Packet::LiteralData($p) => $body,
            Packet::Marker($p) => $body,
            Packet::PublicKeyEncryptedSessionKey($p) => $body,
            Packet::Signature($p) => $body,
            Packet::SymEncryptedData($p) => $body,
            Packet::SymKeyEncryptedSessionKey($p) => $body,
            Packet::UserId($p) => $body,
        }
    };
}

/// Writes the full packet, header included.
impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for_each_packet!(self, p => p.to_writer_with_header(writer))
    }

    fn write_len(&self) -> usize {
        for_each_packet!(self, p => p.write_len_with_header())
    }
}

impl Packet {
    /// Writes only the packet body.
    pub fn body_to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for_each_packet!(self, p => p.to_writer(writer))
    }

    /// Returns the packet body as bytes.
    pub fn body_to_bytes(&self) -> Result<Vec<u8>> {
        for_each_packet!(self, p => p.to_bytes())
    }
}

pub trait PacketTrait: Serialize {
    fn packet_header(&self) -> &PacketHeader;

    fn packet_header_version(&self) -> PacketHeaderVersion {
        self.packet_header().version()
    }

    fn tag(&self) -> Tag {
        self.packet_header().tag()
    }

    /// Containers can not predict their body length before encoding, their
    /// header is always rebuilt from the encoded body.
    fn recompute_length(&self) -> bool {
        false
    }

    /// The header written in front of the body.
    ///
    /// Fixed and partial lengths are normalized to the fixed length of the
    /// body as we encode it. An old style indeterminate length is kept, unless
    /// the packet is a container.
    fn header_for_writing(&self) -> Result<PacketHeader> {
        let original = self.packet_header();

        let len = match original.packet_length() {
            PacketLength::Indeterminate if !self.recompute_length() => return Ok(*original),
            len => len,
        };

        let write_len: u32 = self.write_len().try_into()?;
        let header = PacketHeader::from_parts(
            original.version(),
            original.tag(),
            PacketLength::Fixed(write_len),
        )?;

        if len != PacketLength::Fixed(write_len) && !self.recompute_length() {
            warn!(
                "packet header mismatch between reading and writing: original: {:?}, generated: {:?}",
                original, header
            );
        }

        Ok(header)
    }

    /// Write this packet including the packet header.
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.header_for_writing()?.to_writer(writer)?;
        self.to_writer(writer)?;

        Ok(())
    }

    /// Length in bytes used when calling `to_writer_with_header`.
    fn write_len_with_header(&self) -> usize {
        let header_len = match self.header_for_writing() {
            Ok(header) => header.write_len(),
            Err(_) => self.packet_header().write_len(),
        };
        header_len + self.write_len()
    }
}

impl PacketTrait for Packet {
    fn packet_header(&self) -> &PacketHeader {
        for_each_packet!(self, p => p.packet_header())
    }

    fn recompute_length(&self) -> bool {
        for_each_packet!(self, p => p.recompute_length())
    }

    fn header_for_writing(&self) -> Result<PacketHeader> {
        for_each_packet!(self, p => p.header_for_writing())
    }

    // `Serialize` for `Packet` already includes the header
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.to_writer(writer)
    }

    fn write_len_with_header(&self) -> usize {
        self.write_len()
    }
}

impl<'a, T: 'a + PacketTrait> PacketTrait for &'a T {
    fn packet_header(&self) -> &PacketHeader {
        (*self).packet_header()
    }

    fn recompute_length(&self) -> bool {
        (*self).recompute_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::UserId;

    #[test]
    fn test_try_from_packet() {
        let packet: Packet = UserId::from_str(PacketHeaderVersion::New, "Alice <a@b.c>").into();
        assert_eq!(packet.tag(), Tag::UserId);

        let marker: Result<Marker> = packet.clone().try_into();
        assert!(marker.is_err());

        let id: UserId = packet.try_into().unwrap();
        assert_eq!(id.id(), b"Alice <a@b.c>");
    }

    #[test]
    fn test_header_is_normalized() {
        let id = UserId::from_str(PacketHeaderVersion::New, "x");
        let packet: Packet = id.into();
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(bytes, vec![0xcd, 0x01, b'x']);
        assert_eq!(packet.write_len(), 3);
        assert_eq!(packet.body_to_bytes().unwrap(), b"x");
    }
}
