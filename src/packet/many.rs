use std::io;

use bytes::{Buf, Bytes, BytesMut};
use log::debug;

use crate::config::AlgorithmRegistry;
use crate::errors::{Error, Result};
use crate::packet::header::read_new_length;
use crate::packet::{
    CompressedData, LiteralData, Marker, Packet, PacketHeader, PacketTrait, PublicKey,
    PublicKeyEncryptedSessionKey, PublicSubkey, SecretKey, SecretSubkey, Signature,
    SymEncryptedData, SymKeyEncryptedSessionKey, UserId,
};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketLength, Tag};

/// Reads the next packet, `Ok(None)` at the clean end of the input.
///
/// Algorithm ids are checked against [`AlgorithmRegistry::rfc4880`].
pub fn read_packet<B: Buf>(input: &mut B) -> Result<Option<Packet>> {
    read_packet_with_registry(input, &AlgorithmRegistry::rfc4880())
}

/// How deep containers and embedded signatures may nest.
pub(crate) const MAX_NESTING: usize = 16;

/// Reads the next packet, accepting only the algorithms in `registry`.
pub fn read_packet_with_registry<B: Buf>(
    input: &mut B,
    registry: &AlgorithmRegistry,
) -> Result<Option<Packet>> {
    read_packet_nested(input, registry, 0)
}

/// Reads a packet found `depth` containers deep.
pub(crate) fn read_packet_nested<B: Buf>(
    input: &mut B,
    registry: &AlgorithmRegistry,
    depth: usize,
) -> Result<Option<Packet>> {
    if !input.has_remaining() {
        return Ok(None);
    }
    ensure!(
        depth <= MAX_NESTING,
        "packets nested more than {} levels deep",
        MAX_NESTING
    );

    let header = PacketHeader::from_buf(&mut *input)?;
    debug!("found header: {:?}", header);

    let body = match header.packet_length() {
        PacketLength::Fixed(len) => input.read_take(len.try_into()?)?,
        PacketLength::Indeterminate => input.rest(),
        PacketLength::Partial(len) => read_partial_body(input, len)?,
    };

    let packet = parse_body(header, body, registry, depth)?;
    Ok(Some(packet))
}

/// Writes a full packet, header included.
pub fn write_packet<W: io::Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    debug!("writing packet {:?}", packet.tag());
    packet.to_writer(writer)
}

/// Concatenates partial body chunks, up to and including the final fixed
/// length chunk.
fn read_partial_body<B: Buf>(input: &mut B, first: u32) -> Result<Bytes> {
    let mut body = BytesMut::new();
    body.extend_from_slice(&input.read_take(first.try_into()?)?);

    loop {
        match read_new_length(&mut *input)? {
            PacketLength::Partial(len) => {
                body.extend_from_slice(&input.read_take(len.try_into()?)?);
            }
            PacketLength::Fixed(len) => {
                body.extend_from_slice(&input.read_take(len.try_into()?)?);
                break;
            }
            PacketLength::Indeterminate => {
                bail!("indeterminate length inside a partial body");
            }
        }
    }

    Ok(body.freeze())
}

/// Decodes a packet body.
///
/// Malformed bodies are wrapped in [`Error::InvalidPacketContent`], unsupported
/// algorithms and features are returned as they are.
fn parse_body(
    header: PacketHeader,
    mut body: Bytes,
    registry: &AlgorithmRegistry,
    depth: usize,
) -> Result<Packet> {
    let tag = header.tag();
    if let Tag::Other(tag) = tag {
        return Err(Error::UnknownTag { tag });
    }
    if !tag.is_supported() {
        unsupported_err!("packet {:?}", tag);
    }
    debug!("parsing {:?} body of {} bytes", tag, body.len());

    let res: Result<Packet> = match tag {
        Tag::PublicKeyEncryptedSessionKey => {
            PublicKeyEncryptedSessionKey::from_buf(header, &mut body).map(Into::into)
        }
        Tag::Signature => Signature::from_buf_nested(header, &mut body, depth).map(Into::into),
        Tag::SymKeyEncryptedSessionKey => {
            SymKeyEncryptedSessionKey::from_buf(header, &mut body).map(Into::into)
        }
        Tag::SecretKey => SecretKey::from_buf(header, &mut body).map(Into::into),
        Tag::PublicKey => PublicKey::from_buf(header, &mut body).map(Into::into),
        Tag::SecretSubkey => SecretSubkey::from_buf(header, &mut body).map(Into::into),
        Tag::CompressedData => {
            CompressedData::from_buf_nested(header, &mut body, registry, depth).map(Into::into)
        }
        Tag::SymEncryptedData => SymEncryptedData::from_buf(header, &mut body).map(Into::into),
        Tag::Marker => Marker::from_buf(header, &mut body).map(Into::into),
        Tag::LiteralData => LiteralData::from_buf(header, &mut body).map(Into::into),
        Tag::UserId => UserId::from_buf(header, &mut body).map(Into::into),
        Tag::PublicSubkey => PublicSubkey::from_buf(header, &mut body).map(Into::into),
        _ => unsupported_err!("packet {:?}", tag),
    };

    let packet = res
        .and_then(|packet| {
            ensure!(
                !body.has_remaining(),
                "{:?} packet has {} trailing bytes",
                tag,
                body.remaining()
            );
            registry.check_packet(&packet)?;
            Ok(packet)
        })
        .map_err(|err| match err {
            Error::Unsupported { .. } | Error::Unimplemented { .. } => err,
            err => Error::InvalidPacketContent {
                source: Box::new(err),
            },
        })?;

    Ok(packet)
}

/// Iterator over the packets in a byte buffer.
///
/// Malformed packet bodies are returned as errors and reading continues with
/// the next packet. Any other error ends the iteration.
#[derive(Debug)]
pub struct PacketParser {
    input: Bytes,
    registry: AlgorithmRegistry,
    done: bool,
}

impl PacketParser {
    pub fn new(input: impl Into<Bytes>) -> Self {
        Self::with_registry(input.into(), AlgorithmRegistry::rfc4880())
    }

    pub fn with_registry(input: Bytes, registry: AlgorithmRegistry) -> Self {
        PacketParser {
            input,
            registry,
            done: false,
        }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> &[u8] {
        &self.input
    }
}

impl Iterator for PacketParser {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match read_packet_with_registry(&mut self.input, &self.registry) {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err @ Error::InvalidPacketContent { .. }) => Some(Err(err)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
