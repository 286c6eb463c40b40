use bitfields::bitfield;
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use log::debug;

use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Represents a packet header.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketHeader {
    Old {
        header: OldPacketHeader,
        length: PacketLength,
    },
    New {
        header: NewPacketHeader,
        length: PacketLength,
    },
}

/// Maximum size of partial packet length.
const MAX_PARTIAL_LEN: u32 = 2u32.pow(30);

impl PacketHeader {
    /// Parse a single packet header from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let header = i.read_u8()?;

        match header & 0b1100_0000 {
            0b1100_0000 => {
                let header = NewPacketHeader::from_bits(header);
                let length = read_new_length(&mut i)?;
                Ok(PacketHeader::New { header, length })
            }
            0b1000_0000 => {
                let header = OldPacketHeader::from_bits(header);
                let length = match header.length_type() {
                    // One-Octet Lengths
                    0 => PacketLength::Fixed(i.read_u8()?.into()),
                    // Two-Octet Lengths
                    1 => PacketLength::Fixed(i.read_be_u16()?.into()),
                    // Four-Octet Lengths
                    2 => PacketLength::Fixed(i.read_be_u32()?),
                    _ => PacketLength::Indeterminate,
                };
                Ok(PacketHeader::Old { header, length })
            }
            _ => {
                bail!("invalid packet header octet {:08b}", header);
            }
        }
    }

    pub fn from_parts(
        version: PacketHeaderVersion,
        tag: Tag,
        length: PacketLength,
    ) -> Result<Self> {
        match version {
            PacketHeaderVersion::Old => {
                let typ = match length {
                    PacketLength::Fixed(len) => old_fixed_type(len),
                    PacketLength::Indeterminate => 3,
                    PacketLength::Partial(_) => {
                        bail!("partial lengths are only supported in new style headers");
                    }
                };

                Ok(Self::Old {
                    header: OldPacketHeaderBuilder::new()
                        .checked_with_tag(tag.into())
                        .map_err(|_| {
                            format_err!("tag is not compatible with old packet headers: {:?}", tag)
                        })?
                        .with_length_type(typ)
                        .build(),
                    length,
                })
            }
            PacketHeaderVersion::New => {
                ensure!(
                    !matches!(length, PacketLength::Indeterminate),
                    "indeterminate packet length is only supported in old style headers"
                );
                if let PacketLength::Partial(l) = length {
                    ensure!(l.count_ones() == 1, "partial length must be a power of two");
                    ensure!(
                        l <= MAX_PARTIAL_LEN,
                        "partial length must be less or equal than {}",
                        MAX_PARTIAL_LEN
                    );
                }

                Ok(Self::New {
                    header: NewPacketHeaderBuilder::new()
                        .checked_with_tag(tag.into())
                        .map_err(|_| format_err!("tag {:?} does not fit a packet header", tag))?
                        .build(),
                    length,
                })
            }
        }
    }

    /// Creates a `New` style packet header.
    pub fn new_fixed(tag: Tag, length: u32) -> Self {
        let header = NewPacketHeaderBuilder::new().with_tag(tag.into()).build();
        PacketHeader::New {
            header,
            length: PacketLength::Fixed(length),
        }
    }

    /// Header for a freshly built packet of one of the handled kinds.
    ///
    /// All of them have tags below 16, so both formats can hold them. The
    /// length is rewritten from the encoded body when the packet is written.
    pub(crate) fn new_for_body(version: PacketHeaderVersion, tag: Tag, len: usize) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        let tag = u8::from(tag);
        debug_assert!(tag <= 15, "tag {} does not fit an old style header", tag);

        match version {
            PacketHeaderVersion::Old => PacketHeader::Old {
                header: OldPacketHeaderBuilder::new()
                    .with_tag(tag & 0x0F)
                    .with_length_type(old_fixed_type(len))
                    .build(),
                length: PacketLength::Fixed(len),
            },
            PacketHeaderVersion::New => PacketHeader::New {
                header: NewPacketHeaderBuilder::new().with_tag(tag & 0x3F).build(),
                length: PacketLength::Fixed(len),
            },
        }
    }

    /// Returns the packet header version.
    pub const fn version(&self) -> PacketHeaderVersion {
        match self {
            Self::Old { .. } => PacketHeaderVersion::Old,
            Self::New { .. } => PacketHeaderVersion::New,
        }
    }

    /// Returns the packet length.
    pub fn packet_length(&self) -> PacketLength {
        match self {
            Self::Old { length, .. } => *length,
            Self::New { length, .. } => *length,
        }
    }

    /// Returns the packet tag.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Old { header, .. } => header.tag().into(),
            Self::New { header, .. } => header.tag().into(),
        }
    }

    /// The old style length type, `None` for new style headers.
    pub fn old_length_type(&self) -> Option<u8> {
        match self {
            Self::Old { header, .. } => Some(header.length_type()),
            Self::New { .. } => None,
        }
    }
}

/// Reads a new style length, as used by packet headers and partial body chunks.
pub(crate) fn read_new_length<B: Buf>(mut i: B) -> Result<PacketLength> {
    let olen = i.read_u8()?;
    let length = match olen {
        // One-Octet Lengths
        0..=191 => PacketLength::Fixed(olen.into()),
        // Two-Octet Lengths
        192..=223 => {
            let a = i.read_u8()?;
            let l = ((u32::from(olen) - 192) << 8) + 192 + u32::from(a);
            PacketLength::Fixed(l)
        }
        // Partial Body Lengths
        224..=254 => PacketLength::Partial(1 << (olen & 0x1F)),
        // Five-Octet Lengths
        255 => PacketLength::Fixed(i.read_be_u32()?),
    };

    Ok(length)
}

impl Serialize for PacketHeader {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        debug!("writing packet header {:?}", self);

        match self {
            Self::New { header, length } => {
                writer.write_u8(header.into_bits())?;
                length.to_writer_new(writer)?;
            }
            Self::Old { header, length } => {
                writer.write_u8(header.into_bits())?;
                match length {
                    PacketLength::Fixed(len) => match header.length_type() {
                        0 => writer.write_u8((*len).try_into()?)?,
                        1 => writer.write_u16::<BigEndian>((*len).try_into()?)?,
                        2 => writer.write_u32::<BigEndian>(*len)?,
                        _ => bail!("fixed length with an indeterminate old length type"),
                    },
                    PacketLength::Indeterminate => {}
                    PacketLength::Partial(_) => {
                        bail!("partial lengths are only supported in new style headers");
                    }
                }
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::New { length, .. } => match length {
                PacketLength::Fixed(len) => 1 + PacketLength::fixed_encoding_len(*len),
                PacketLength::Partial(_) => 1 + 1,
                // rejected by `to_writer`
                PacketLength::Indeterminate => 1,
            },
            Self::Old { header, .. } => match header.length_type() {
                0 => 1 + 1,
                1 => 1 + 2,
                2 => 1 + 4,
                _ => 1,
            },
        }
    }
}

/// Old format packet header
#[bitfield(u8, order = msb)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OldPacketHeader {
    /// First bit is always 1
    #[bits(1, default = true)]
    _padding: bool,
    /// Version: 0
    #[bits(1, default = false)]
    _version: bool,
    /// Packet tag, 0 to 15
    #[bits(4)]
    tag: u8,
    /// length-type
    #[bits(2)]
    length_type: u8,
}

/// New format packet header
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2.2>
#[bitfield(u8, order = msb)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NewPacketHeader {
    /// First bit is always 1
    #[bits(1, default = true)]
    _padding: bool,
    /// Version: 1
    #[bits(1, default = true)]
    _version: bool,
    /// Packet tag
    #[bits(6)]
    tag: u8,
}

/// Smallest old style length type able to hold `len`.
fn old_fixed_type(len: u32) -> u8 {
    if len < 256 {
        0
    } else if len < 65536 {
        1
    } else {
        2
    }
}
