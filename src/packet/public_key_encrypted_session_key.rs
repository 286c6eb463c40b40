use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;
use log::debug;
use rand::{CryptoRng, Rng};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    KeyId, PacketHeaderVersion, Password, PkeskBytes, PkeskVersion, PublicKeyTrait,
    SecretKeyTrait, SessionKey, Tag,
};

/// Public Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.1>
///
/// Holds a session key encrypted to the public key identified by `id`.
/// The plaintext is `algorithm || session key || checksum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    packet_header: PacketHeader,
    version: PkeskVersion,
    id: KeyId,
    algorithm: PublicKeyAlgorithm,
    values: PkeskBytes,
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = PkeskVersion::from(i.read_u8()?);
        if let PkeskVersion::Other(v) = version {
            unsupported_err!("PKESK version {}", v);
        }

        let id = KeyId::from(i.read_array::<8>()?);
        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let values = PkeskBytes::from_buf(algorithm, &mut i)?;

        Ok(PublicKeyEncryptedSessionKey {
            packet_header,
            version,
            id,
            algorithm,
            values,
        })
    }

    /// Encrypts the session key to `pkey`.
    pub fn from_session_key<R: CryptoRng + Rng>(
        rng: R,
        packet_version: PacketHeaderVersion,
        session_key: &SessionKey,
        pkey: &impl PublicKeyTrait,
    ) -> Result<Self> {
        let plain = session_key.to_pkesk_plaintext();
        let values = pkey.encrypt_session_key(rng, &plain)?;
        debug!(
            "encrypted {:?} session key to {}",
            session_key.sym_algorithm,
            pkey.key_id()
        );

        let len = 1 + 8 + 1 + values.write_len();
        Ok(PublicKeyEncryptedSessionKey {
            packet_header: PacketHeader::new_for_body(
                packet_version,
                Tag::PublicKeyEncryptedSessionKey,
                len,
            ),
            version: PkeskVersion::V3,
            id: pkey.key_id(),
            algorithm: pkey.algorithm(),
            values,
        })
    }

    /// Recovers the session key with the secret key, validating its checksum.
    pub fn decrypt(&self, key: &impl SecretKeyTrait, key_pw: &Password) -> Result<SessionKey> {
        ensure_eq!(
            key.algorithm(),
            self.algorithm,
            "session key was not encrypted with this algorithm"
        );
        if self.id != key.key_id() {
            debug!("decrypting PKESK for {} with key {}", self.id, key.key_id());
        }

        let plain = key.decrypt_session_key(key_pw, &self.values)?;
        SessionKey::from_pkesk_plaintext(&plain)
    }

    pub fn version(&self) -> PkeskVersion {
        self.version
    }

    /// The key id of the recipient.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn values(&self) -> &PkeskBytes {
        &self.values
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.into())?;
        writer.write_all(self.id.as_ref())?;
        writer.write_u8(self.algorithm.into())?;
        self.values.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 8 + 1 + self.values.write_len()
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_elgamal() {
        // version 3, key id, elgamal, a 9 and a 10 bit mpi
        let body = hex::decode("0301020304050607081000090102000a0304").unwrap();
        let header = PacketHeader::new_fixed(Tag::PublicKeyEncryptedSessionKey, body.len() as u32);
        let pkesk = PublicKeyEncryptedSessionKey::from_buf(header, &body[..]).unwrap();

        assert_eq!(pkesk.version(), PkeskVersion::V3);
        assert_eq!(pkesk.id().to_string(), "0102030405060708");
        assert_eq!(pkesk.algorithm(), PublicKeyAlgorithm::ElgamalEncrypt);
        assert!(matches!(pkesk.values(), PkeskBytes::Elgamal { .. }));
        assert_eq!(pkesk.to_bytes().unwrap(), body);
    }

    #[test]
    fn test_unsupported() {
        let header = PacketHeader::new_fixed(Tag::PublicKeyEncryptedSessionKey, 11);

        // version 2
        let body = hex::decode("0201020304050607080100").unwrap();
        assert!(PublicKeyEncryptedSessionKey::from_buf(header, &body[..]).is_err());

        // DSA can not encrypt
        let body = hex::decode("0301020304050607081100").unwrap();
        assert!(PublicKeyEncryptedSessionKey::from_buf(header, &body[..]).is_err());
    }
}
