use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use log::warn;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::{time_to_u32, Serialize};
use crate::types::{PacketHeaderVersion, Tag};

/// Literal Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.9>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct LiteralData {
    packet_header: PacketHeader,
    mode: DataMode,
    /// The filename, may contain non utf-8 bytes
    #[debug("{}", hex::encode(file_name))]
    file_name: Bytes,
    created: DateTime<Utc>,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    /// Local mode, from RFC 1991
    Local = b'l',
    Utf8 = b'u',
}

impl LiteralData {
    /// Creates a literal data packet from the given string. Uses text mode.
    pub fn from_str(version: PacketHeaderVersion, file_name: &str, raw_data: &str) -> Self {
        Self::new(
            version,
            DataMode::Text,
            Bytes::copy_from_slice(file_name.as_bytes()),
            Bytes::copy_from_slice(raw_data.as_bytes()),
        )
    }

    /// Creates a literal data packet from the given bytes. Uses binary mode.
    pub fn from_bytes(version: PacketHeaderVersion, file_name: &[u8], data: Bytes) -> Self {
        Self::new(
            version,
            DataMode::Binary,
            Bytes::copy_from_slice(file_name),
            data,
        )
    }

    fn new(version: PacketHeaderVersion, mode: DataMode, file_name: Bytes, data: Bytes) -> Self {
        let len = 1 + 1 + file_name.len() + 4 + data.len();

        LiteralData {
            packet_header: PacketHeader::new_for_body(version, Tag::LiteralData, len),
            mode,
            file_name,
            created: Utc::now().trunc_subsecs(0),
            data,
        }
    }

    /// Replaces the modification date.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created.trunc_subsecs(0);
        self
    }

    /// Parses a `LiteralData` packet from the given buffer.
    ///
    /// Unknown data formats are read as binary.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut data: B) -> Result<Self> {
        let raw_mode = data.read_u8()?;
        let mode = DataMode::try_from(raw_mode).unwrap_or_else(|_| {
            warn!("invalid literal data format {:#04x}, using binary", raw_mode);
            DataMode::Binary
        });

        let name_len = data.read_u8()?;
        let file_name = data.read_take(name_len.into())?;
        let created = data.read_be_u32()?;
        let created = Utc
            .timestamp_opt(created.into(), 0)
            .single()
            .ok_or_else(|| format_err!("invalid created field"))?;
        let data = data.rest();

        Ok(LiteralData {
            packet_header,
            mode,
            file_name,
            created,
            data,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.mode, DataMode::Binary)
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Convert the data to a UTF-8 string, if appropriate for the type.
    /// Returns `None` if the data is binary or not valid UTF-8.
    pub fn to_string(&self) -> Option<String> {
        match self.mode {
            DataMode::Binary => None,
            _ => std::str::from_utf8(&self.data).map(str::to_owned).ok(),
        }
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let name_len: u8 = self
            .file_name
            .len()
            .try_into()
            .map_err(|_| format_err!("file name too long: {} bytes", self.file_name.len()))?;

        writer.write_u8(self.mode.into())?;
        writer.write_u8(name_len)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(time_to_u32(&self.created))?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4 + self.data.len()
    }
}

impl PacketTrait for LiteralData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_literal_data_encoding() {
        let created = Utc.timestamp_opt(0x5c00_0000, 0).single().unwrap();
        let lit = LiteralData::from_str(PacketHeaderVersion::New, "a.txt", "hi").with_created(created);

        let body = lit.to_bytes().unwrap();
        assert_eq!(hex::encode(&body), "7405612e7478745c0000006869");
        assert_eq!(body.len(), lit.write_len());

        let back = LiteralData::from_buf(*lit.packet_header(), &body[..]).unwrap();
        assert_eq!(back, lit);
        assert_eq!(back.to_string().unwrap(), "hi");
    }

    #[test]
    fn test_modes() {
        for (raw, mode) in [
            (b'b', DataMode::Binary),
            (b't', DataMode::Text),
            (b'l', DataMode::Local),
            (b'u', DataMode::Utf8),
            (b'x', DataMode::Binary),
        ] {
            let body = [raw, 0, 0, 0, 0, 0, b'z'];
            let header = PacketHeader::new_fixed(Tag::LiteralData, body.len() as u32);
            let lit = LiteralData::from_buf(header, &body[..]).unwrap();
            assert_eq!(lit.mode(), mode);
            assert_eq!(lit.data(), b"z");
            assert!(lit.file_name().is_empty());
        }
    }

    #[test]
    fn test_binary_has_no_string() {
        let lit = LiteralData::from_bytes(PacketHeaderVersion::Old, b"x.bin", Bytes::from_static(b"abc"));
        assert!(lit.is_binary());
        assert!(lit.to_string().is_none());
    }

    #[test]
    fn test_file_name_too_long() {
        let name = "n".repeat(256);
        let lit = LiteralData::from_str(PacketHeaderVersion::New, &name, "");
        assert!(lit.to_bytes().is_err());
    }

    #[test]
    fn test_truncated() {
        let header = PacketHeader::new_fixed(Tag::LiteralData, 4);
        let err = LiteralData::from_buf(header, &[b'b', 3, b'a', b'b'][..]).unwrap_err();
        assert!(err.is_incomplete());
    }
}
