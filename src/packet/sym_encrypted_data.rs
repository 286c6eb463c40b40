use std::io;

use bytes::{Buf, Bytes};
use log::debug;
use rand::{CryptoRng, Rng};

use crate::config::AlgorithmRegistry;
use crate::errors::Result;
use crate::packet::{read_packet_nested, Packet, PacketHeader, PacketTrait};
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, SessionKey, Tag};

/// Symmetrically Encrypted Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.7>
///
/// The body is opaque until it is decrypted with the session key.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymEncryptedData {
    packet_header: PacketHeader,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl SymEncryptedData {
    /// Parses a `SymEncryptedData` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let data = input.copy_to_bytes(input.remaining());
        Ok(SymEncryptedData {
            packet_header,
            data,
        })
    }

    /// Serializes the packets and encrypts them in OpenPGP CFB mode.
    pub fn encrypt_packets<R: CryptoRng + Rng>(
        rng: R,
        version: PacketHeaderVersion,
        session_key: &SessionKey,
        packets: &[Packet],
    ) -> Result<Self> {
        let mut plain = Vec::new();
        for packet in packets {
            packet.to_writer(&mut plain)?;
        }

        let data: Bytes = session_key
            .sym_algorithm
            .encrypt(rng, &session_key.key, &plain)?
            .into();
        debug!(
            "encrypted {} packets with {:?}",
            packets.len(),
            session_key.sym_algorithm
        );

        Ok(SymEncryptedData {
            packet_header: PacketHeader::new_for_body(version, Tag::SymEncryptedData, data.len()),
            data,
        })
    }

    /// Decrypts the body and decodes the contained packets.
    ///
    /// A session key that does not pass the quick check fails with
    /// [`crate::errors::Error::SessionKeyMismatch`].
    pub fn decrypt_packets(&self, session_key: &SessionKey) -> Result<Vec<Packet>> {
        self.decrypt_packets_with_registry(session_key, &AlgorithmRegistry::rfc4880())
    }

    pub fn decrypt_packets_with_registry(
        &self,
        session_key: &SessionKey,
        registry: &AlgorithmRegistry,
    ) -> Result<Vec<Packet>> {
        let plain = session_key
            .sym_algorithm
            .decrypt(&session_key.key, &self.data)?;

        let mut body = Bytes::from(plain);
        let mut packets = Vec::new();
        while let Some(packet) = read_packet_nested(&mut body, registry, 1)? {
            packets.push(packet);
        }

        Ok(packets)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for SymEncryptedData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }

    fn recompute_length(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::sym::SymmetricKeyAlgorithm;
    use crate::errors::Error;
    use crate::packet::{LiteralData, UserId};

    #[test]
    fn test_encrypt_decrypt() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let packets: Vec<Packet> = vec![
            LiteralData::from_str(PacketHeaderVersion::New, "x", "hello").into(),
            UserId::from_str(PacketHeaderVersion::Old, "u").into(),
        ];

        for alg in [
            SymmetricKeyAlgorithm::CAST5,
            SymmetricKeyAlgorithm::AES256,
            SymmetricKeyAlgorithm::TripleDES,
        ] {
            let key = SessionKey::new(&mut rng, alg).unwrap();
            let enc = SymEncryptedData::encrypt_packets(
                &mut rng,
                PacketHeaderVersion::New,
                &key,
                &packets,
            )
            .unwrap();
            assert_eq!(enc.data().len(), alg.block_size() + 2 + 17);

            assert_eq!(enc.decrypt_packets(&key).unwrap(), packets);

            let wrong = SessionKey::new(&mut rng, alg).unwrap();
            let err = enc.decrypt_packets(&wrong).unwrap_err();
            assert!(matches!(err, Error::SessionKeyMismatch));
        }
    }
}
