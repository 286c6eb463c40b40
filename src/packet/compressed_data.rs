use std::io::{self, Read, Write};

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use log::debug;

use crate::config::AlgorithmRegistry;
use crate::errors::Result;
use crate::packet::{read_packet_nested, Packet, PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, PacketHeaderVersion, Tag};

/// Compressed Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.6>
///
/// The contained packets are decoded eagerly. The compressed bytes are kept
/// so that a decoded packet is written back unchanged.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct CompressedData {
    packet_header: PacketHeader,
    compression_algorithm: CompressionAlgorithm,
    #[debug("{}", hex::encode(compressed_data))]
    compressed_data: Bytes,
    packets: Vec<Packet>,
}

impl CompressedData {
    /// Parses a `CompressedData` packet, accepting the default algorithm set
    /// for the contained packets.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, input: B) -> Result<Self> {
        Self::from_buf_with_registry(packet_header, input, &AlgorithmRegistry::rfc4880())
    }

    pub fn from_buf_with_registry<B: Buf>(
        packet_header: PacketHeader,
        input: B,
        registry: &AlgorithmRegistry,
    ) -> Result<Self> {
        Self::from_buf_nested(packet_header, input, registry, 0)
    }

    /// Parses a container found `depth` containers deep.
    pub(crate) fn from_buf_nested<B: Buf>(
        packet_header: PacketHeader,
        mut input: B,
        registry: &AlgorithmRegistry,
        depth: usize,
    ) -> Result<Self> {
        let compression_algorithm = CompressionAlgorithm::from(input.read_u8()?);
        let compressed_data = input.rest();

        let decompressed = decompress(compression_algorithm, &compressed_data)?;
        debug!(
            "decompressed {:?}: {} -> {} bytes",
            compression_algorithm,
            compressed_data.len(),
            decompressed.len()
        );

        let mut body = Bytes::from(decompressed);
        let mut packets = Vec::new();
        while let Some(packet) = read_packet_nested(&mut body, registry, depth + 1)? {
            packets.push(packet);
        }

        Ok(CompressedData {
            packet_header,
            compression_algorithm,
            compressed_data,
            packets,
        })
    }

    /// Compresses the given packets, in order.
    ///
    /// `level` ranges from 0 to 9 and is ignored for uncompressed containers.
    pub fn from_packets(
        version: PacketHeaderVersion,
        compression_algorithm: CompressionAlgorithm,
        level: u32,
        packets: Vec<Packet>,
    ) -> Result<Self> {
        let mut plain = Vec::new();
        for packet in &packets {
            packet.to_writer(&mut plain)?;
        }

        let compressed_data: Bytes = compress(compression_algorithm, level, &plain)?.into();
        let packet_header =
            PacketHeader::new_for_body(version, Tag::CompressedData, 1 + compressed_data.len());

        Ok(CompressedData {
            packet_header,
            compression_algorithm,
            compressed_data,
            packets,
        })
    }

    pub fn compression_algorithm(&self) -> CompressionAlgorithm {
        self.compression_algorithm
    }

    pub fn compressed_data(&self) -> &[u8] {
        &self.compressed_data
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<Packet> {
        self.packets
    }
}

fn decompress(alg: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match alg {
        CompressionAlgorithm::Uncompressed => out.extend_from_slice(data),
        CompressionAlgorithm::ZIP => {
            DeflateDecoder::new(data).read_to_end(&mut out)?;
        }
        CompressionAlgorithm::ZLIB => {
            ZlibDecoder::new(data).read_to_end(&mut out)?;
        }
        CompressionAlgorithm::BZip2 | CompressionAlgorithm::Other(_) => {
            unsupported_err!("compression algorithm {}", alg)
        }
    }

    Ok(out)
}

fn compress(alg: CompressionAlgorithm, level: u32, data: &[u8]) -> Result<Vec<u8>> {
    ensure!(level <= 9, "invalid compression level {}", level);

    let out = match alg {
        CompressionAlgorithm::Uncompressed => data.to_vec(),
        CompressionAlgorithm::ZIP => {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::new(level));
            enc.write_all(data)?;
            enc.finish()?
        }
        CompressionAlgorithm::ZLIB => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
            enc.write_all(data)?;
            enc.finish()?
        }
        CompressionAlgorithm::BZip2 | CompressionAlgorithm::Other(_) => {
            unsupported_err!("compression algorithm {}", alg)
        }
    };

    Ok(out)
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.compression_algorithm.into())?;
        writer.write_all(&self.compressed_data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.compressed_data.len()
    }
}

impl PacketTrait for CompressedData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }

    fn recompute_length(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::errors::Error;
    use crate::packet::{read_packet, LiteralData};

    fn literals() -> Vec<Packet> {
        vec![
            LiteralData::from_str(PacketHeaderVersion::New, "one.txt", "first").into(),
            LiteralData::from_str(PacketHeaderVersion::New, "two.txt", "second").into(),
        ]
    }

    #[test]
    fn test_roundtrip_algorithms() {
        let _ = pretty_env_logger::try_init();
        let packets = literals();

        for alg in [
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::ZIP,
            CompressionAlgorithm::ZLIB,
        ] {
            let packet: Packet =
                CompressedData::from_packets(PacketHeaderVersion::New, alg, 6, packets.clone())
                    .unwrap()
                    .into();
            let bytes = packet.to_bytes().unwrap();

            let back = read_packet(&mut &bytes[..]).unwrap().unwrap();
            let Packet::CompressedData(back) = back else {
                panic!("expected compressed data");
            };
            assert_eq!(back.compression_algorithm(), alg);
            assert_eq!(back.packets(), &packets[..]);
        }
    }

    #[test]
    fn test_nested() {
        let inner = CompressedData::from_packets(
            PacketHeaderVersion::New,
            CompressionAlgorithm::ZIP,
            9,
            literals(),
        )
        .unwrap();
        let outer = CompressedData::from_packets(
            PacketHeaderVersion::Old,
            CompressionAlgorithm::Uncompressed,
            0,
            vec![inner.clone().into()],
        )
        .unwrap();

        let bytes = Packet::from(outer.clone()).to_bytes().unwrap();
        let Packet::CompressedData(back) = read_packet(&mut &bytes[..]).unwrap().unwrap() else {
            panic!("expected compressed data");
        };
        assert_eq!(back, outer);
        assert_eq!(back.packets()[0], Packet::from(inner));
    }

    #[test]
    fn test_bzip2_unsupported() {
        let err = CompressedData::from_packets(
            PacketHeaderVersion::New,
            CompressionAlgorithm::BZip2,
            6,
            literals(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));

        let header = PacketHeader::new_fixed(Tag::CompressedData, 3);
        let err = CompressedData::from_buf(header, &[3u8, 0, 0][..]).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn test_indeterminate_header_is_recomputed() {
        let data = CompressedData::from_packets(
            PacketHeaderVersion::New,
            CompressionAlgorithm::Uncompressed,
            0,
            literals(),
        )
        .unwrap();
        let body = data.to_bytes().unwrap();

        // old style, length type 3
        let mut raw = vec![0x80 | (8 << 2) | 3];
        raw.extend_from_slice(&body);
        let packet = read_packet(&mut &raw[..]).unwrap().unwrap();

        let written = packet.to_bytes().unwrap();
        let header = PacketHeader::from_buf(&mut &written[..]).unwrap();
        assert_eq!(header.old_length_type(), Some(0));
        assert_eq!(header.packet_length(), crate::types::PacketLength::Fixed(body.len() as u32));
    }
}
