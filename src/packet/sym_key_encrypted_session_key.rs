use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Password, SessionKey, SkeskVersion, StringToKey, Tag};

/// Symmetric-Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.3>
///
/// Without an encrypted session key the S2K derived key is itself the session
/// key of the following encrypted data packet.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymKeyEncryptedSessionKey {
    packet_header: PacketHeader,
    version: SkeskVersion,
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{:?}", encrypted_key.as_ref().map(hex::encode))]
    encrypted_key: Option<Bytes>,
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = SkeskVersion::from(i.read_u8()?);
        if let SkeskVersion::Other(v) = version {
            unsupported_err!("SKESK version {}", v);
        }

        let sym_algorithm = SymmetricKeyAlgorithm::from(i.read_u8()?);
        let s2k = StringToKey::from_buf(&mut i)?;
        let encrypted_key = i.has_remaining().then(|| i.rest());

        Ok(SymKeyEncryptedSessionKey {
            packet_header,
            version,
            sym_algorithm,
            s2k,
            encrypted_key,
        })
    }

    /// Wraps `session_key` under the key derived from `msg_pw`.
    ///
    /// The wrapped value is `algorithm || key`, CFB encrypted with an all zero IV.
    pub fn encrypt_v4(
        packet_version: PacketHeaderVersion,
        msg_pw: &Password,
        s2k: StringToKey,
        sym_algorithm: SymmetricKeyAlgorithm,
        session_key: &SessionKey,
    ) -> Result<Self> {
        let key = s2k.derive_key_for(&msg_pw.read(), sym_algorithm)?;

        let mut data = Vec::with_capacity(1 + session_key.key.len());
        data.push(u8::from(session_key.sym_algorithm));
        data.extend_from_slice(&session_key.key);

        let iv = vec![0u8; sym_algorithm.block_size()];
        sym_algorithm.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        Ok(Self::new(packet_version, sym_algorithm, s2k, Some(data.into())))
    }

    /// A packet without wrapped key, the S2K output is the session key.
    pub fn direct(
        packet_version: PacketHeaderVersion,
        s2k: StringToKey,
        sym_algorithm: SymmetricKeyAlgorithm,
    ) -> Self {
        Self::new(packet_version, sym_algorithm, s2k, None)
    }

    fn new(
        packet_version: PacketHeaderVersion,
        sym_algorithm: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        encrypted_key: Option<Bytes>,
    ) -> Self {
        let len = 2 + s2k.write_len() + encrypted_key.as_ref().map(|k| k.len()).unwrap_or(0);

        SymKeyEncryptedSessionKey {
            packet_header: PacketHeader::new_for_body(
                packet_version,
                Tag::SymKeyEncryptedSessionKey,
                len,
            ),
            version: SkeskVersion::V4,
            sym_algorithm,
            s2k,
            encrypted_key,
        }
    }

    /// Recovers the session key.
    ///
    /// A wrong passphrase almost always yields an unknown algorithm or a key of
    /// the wrong length, both reported as [`Error::SessionKeyMismatch`]. Anything
    /// else is only caught when the data packet is decrypted.
    pub fn decrypt(&self, msg_pw: &Password) -> Result<SessionKey> {
        let key = self.s2k.derive_key_for(&msg_pw.read(), self.sym_algorithm)?;

        let Some(encrypted_key) = &self.encrypted_key else {
            debug!("using S2K output as {:?} session key", self.sym_algorithm);
            return SessionKey::from_parts(self.sym_algorithm, &key);
        };
        ensure!(!encrypted_key.is_empty(), "empty encrypted session key");

        let mut decrypted = Zeroizing::new(encrypted_key.to_vec());
        let iv = vec![0u8; self.sym_algorithm.block_size()];
        self.sym_algorithm
            .decrypt_with_iv_regular(&key, &iv, &mut decrypted)?;

        let sym_alg = SymmetricKeyAlgorithm::from(decrypted[0]);
        let raw = &decrypted[1..];
        if sym_alg.key_size() == 0 || raw.len() != sym_alg.key_size() {
            return Err(Error::SessionKeyMismatch);
        }

        SessionKey::from_parts(sym_alg, raw)
    }

    pub fn version(&self) -> SkeskVersion {
        self.version
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_algorithm
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    pub fn encrypted_key(&self) -> Option<&[u8]> {
        self.encrypted_key.as_deref()
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.into())?;
        writer.write_u8(self.sym_algorithm.into())?;
        self.s2k.to_writer(writer)?;
        if let Some(key) = &self.encrypted_key {
            writer.write_all(key)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.s2k.write_len() + self.encrypted_key.as_ref().map(|k| k.len()).unwrap_or(0)
    }
}

impl PacketTrait for SymKeyEncryptedSessionKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
