//! # Configuration
//!
//! Defaults used when building new packets, and the registry of algorithms
//! the packet reader accepts.

use std::collections::BTreeMap;

use bytes::Bytes;
use derive_builder::Builder;
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketParser};
use crate::types::{
    PacketHeaderVersion, PublicKeyTrait, SecretParams, SessionKey, StringToKey,
    DEFAULT_ITER_COUNT,
};

/// Metadata for a symmetric cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricInfo {
    pub name: &'static str,
    pub block_size: usize,
    pub key_size: usize,
}

/// Metadata for a hash algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashInfo {
    pub name: &'static str,
    pub digest_size: usize,
}

/// Metadata for a public key algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub name: &'static str,
    pub can_sign: bool,
    pub can_encrypt: bool,
}

/// The set of algorithms a reader accepts, keyed by their OpenPGP ids.
///
/// Packets referencing an algorithm that is not registered fail to decode
/// with [`Error::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmRegistry {
    symmetric: BTreeMap<u8, SymmetricInfo>,
    hash: BTreeMap<u8, HashInfo>,
    public_key: BTreeMap<u8, PublicKeyInfo>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::rfc4880()
    }
}

impl AlgorithmRegistry {
    /// A registry without any algorithms.
    pub fn empty() -> Self {
        AlgorithmRegistry {
            symmetric: BTreeMap::new(),
            hash: BTreeMap::new(),
            public_key: BTreeMap::new(),
        }
    }

    /// Every algorithm this crate implements.
    pub fn rfc4880() -> Self {
        let mut registry = Self::empty();

        for (alg, name) in [
            (SymmetricKeyAlgorithm::IDEA, "IDEA"),
            (SymmetricKeyAlgorithm::TripleDES, "3DES"),
            (SymmetricKeyAlgorithm::CAST5, "CAST5"),
            (SymmetricKeyAlgorithm::Blowfish, "BLOWFISH"),
            (SymmetricKeyAlgorithm::AES128, "AES128"),
            (SymmetricKeyAlgorithm::AES192, "AES192"),
            (SymmetricKeyAlgorithm::AES256, "AES256"),
            (SymmetricKeyAlgorithm::Twofish, "TWOFISH"),
            (SymmetricKeyAlgorithm::Camellia128, "CAMELLIA128"),
            (SymmetricKeyAlgorithm::Camellia192, "CAMELLIA192"),
            (SymmetricKeyAlgorithm::Camellia256, "CAMELLIA256"),
        ] {
            registry.register_symmetric(alg, name);
        }

        for alg in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Ripemd160,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
            HashAlgorithm::Sha224,
        ] {
            registry.register_hash(alg);
        }

        for (alg, name) in [
            (PublicKeyAlgorithm::RSA, "RSA"),
            (PublicKeyAlgorithm::RSAEncrypt, "RSA-E"),
            (PublicKeyAlgorithm::RSASign, "RSA-S"),
            (PublicKeyAlgorithm::ElgamalEncrypt, "ELG-E"),
            (PublicKeyAlgorithm::DSA, "DSA"),
            (PublicKeyAlgorithm::Elgamal, "ELG"),
        ] {
            registry.register_public_key(alg, name);
        }

        registry
    }

    pub fn register_symmetric(&mut self, alg: SymmetricKeyAlgorithm, name: &'static str) {
        self.symmetric.insert(
            alg.into(),
            SymmetricInfo {
                name,
                block_size: alg.block_size(),
                key_size: alg.key_size(),
            },
        );
    }

    pub fn register_hash(&mut self, alg: HashAlgorithm) {
        if let (Some(digest_size), name) = (alg.digest_size(), hash_name(alg)) {
            self.hash.insert(alg.into(), HashInfo { name, digest_size });
        }
    }

    pub fn register_public_key(&mut self, alg: PublicKeyAlgorithm, name: &'static str) {
        self.public_key.insert(
            alg.into(),
            PublicKeyInfo {
                name,
                can_sign: alg.can_sign(),
                can_encrypt: alg.can_encrypt(),
            },
        );
    }

    pub fn remove_symmetric(&mut self, alg: SymmetricKeyAlgorithm) -> Option<SymmetricInfo> {
        self.symmetric.remove(&alg.into())
    }

    pub fn remove_hash(&mut self, alg: HashAlgorithm) -> Option<HashInfo> {
        self.hash.remove(&alg.into())
    }

    pub fn remove_public_key(&mut self, alg: PublicKeyAlgorithm) -> Option<PublicKeyInfo> {
        self.public_key.remove(&alg.into())
    }

    pub fn symmetric(&self, alg: SymmetricKeyAlgorithm) -> Option<&SymmetricInfo> {
        self.symmetric.get(&alg.into())
    }

    pub fn hash(&self, alg: HashAlgorithm) -> Option<&HashInfo> {
        self.hash.get(&alg.into())
    }

    pub fn public_key(&self, alg: PublicKeyAlgorithm) -> Option<&PublicKeyInfo> {
        self.public_key.get(&alg.into())
    }

    pub fn check_symmetric(&self, alg: SymmetricKeyAlgorithm) -> Result<&SymmetricInfo> {
        match self.symmetric(alg) {
            Some(info) => Ok(info),
            None => unsupported_err!("symmetric algorithm {:?}", alg),
        }
    }

    pub fn check_hash(&self, alg: HashAlgorithm) -> Result<&HashInfo> {
        match self.hash(alg) {
            Some(info) => Ok(info),
            None => unsupported_err!("hash algorithm {:?}", alg),
        }
    }

    pub fn check_public_key(&self, alg: PublicKeyAlgorithm) -> Result<&PublicKeyInfo> {
        match self.public_key(alg) {
            Some(info) => Ok(info),
            None => unsupported_err!("public key algorithm {:?}", alg),
        }
    }

    /// Checks every algorithm id referenced by a decoded packet.
    ///
    /// Children of compressed containers are checked when they are decoded.
    pub fn check_packet(&self, packet: &Packet) -> Result<()> {
        match packet {
            Packet::PublicKey(key) => {
                self.check_public_key(key.algorithm())?;
            }
            Packet::PublicSubkey(key) => {
                self.check_public_key(key.algorithm())?;
            }
            Packet::SecretKey(key) => {
                self.check_public_key(key.algorithm())?;
                self.check_secret_params(key.secret_params())?;
            }
            Packet::SecretSubkey(key) => {
                self.check_public_key(key.algorithm())?;
                self.check_secret_params(key.secret_params())?;
            }
            Packet::PublicKeyEncryptedSessionKey(p) => {
                self.check_public_key(p.algorithm())?;
            }
            Packet::SymKeyEncryptedSessionKey(p) => {
                self.check_symmetric(p.sym_algorithm())?;
                self.check_hash(p.s2k().hash_alg())?;
            }
            Packet::Signature(sig) => {
                self.check_public_key(sig.pub_alg())?;
                self.check_hash(sig.hash_alg())?;
            }
            Packet::CompressedData(_)
            | Packet::LiteralData(_)
            | Packet::Marker(_)
            | Packet::SymEncryptedData(_)
            | Packet::UserId(_) => {}
        }

        Ok(())
    }

    fn check_secret_params(&self, params: &SecretParams) -> Result<()> {
        if let SecretParams::Encrypted(enc) = params {
            self.check_symmetric(enc.sym_alg)?;
            self.check_hash(enc.s2k.hash_alg())?;
        }
        Ok(())
    }
}

fn hash_name(alg: HashAlgorithm) -> &'static str {
    match alg {
        HashAlgorithm::Md5 => "MD5",
        HashAlgorithm::Sha1 => "SHA1",
        HashAlgorithm::Ripemd160 => "RIPEMD160",
        HashAlgorithm::Sha256 => "SHA256",
        HashAlgorithm::Sha384 => "SHA384",
        HashAlgorithm::Sha512 => "SHA512",
        HashAlgorithm::Sha224 => "SHA224",
        HashAlgorithm::None | HashAlgorithm::Other(_) => "UNKNOWN",
    }
}

/// Defaults for newly created packets.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "Error", validate = "Self::validate"))]
pub struct Config {
    /// Header format for new packets.
    #[builder(default)]
    pub header_version: PacketHeaderVersion,
    /// Compression level for new compressed containers, 0 to 9.
    #[builder(default = "6")]
    pub compression_level: u32,
    #[builder(default = "SymmetricKeyAlgorithm::AES128")]
    pub sym_algorithm: SymmetricKeyAlgorithm,
    #[builder(default = "HashAlgorithm::Sha256")]
    pub hash_algorithm: HashAlgorithm,
    /// Coded iteration count for iterated and salted S2K.
    #[builder(default = "DEFAULT_ITER_COUNT")]
    pub s2k_count: u8,
    #[builder(default)]
    pub registry: AlgorithmRegistry,
}

impl ConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(level) = self.compression_level {
            if level > 9 {
                return Err(format!("invalid compression level {}", level));
            }
        }
        if let Some(alg) = self.sym_algorithm {
            if alg.block_size() == 0 {
                return Err(format!("{:?} can not be used as default cipher", alg));
            }
        }
        if let Some(alg) = self.hash_algorithm {
            if alg.digest_size().is_none() {
                return Err(format!("{:?} can not be used as default hash", alg));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            header_version: PacketHeaderVersion::New,
            compression_level: 6,
            sym_algorithm: SymmetricKeyAlgorithm::AES128,
            hash_algorithm: HashAlgorithm::Sha256,
            s2k_count: DEFAULT_ITER_COUNT,
            registry: AlgorithmRegistry::rfc4880(),
        }
    }
}

impl Config {
    /// Iterated and salted S2K with a fresh salt.
    pub fn string_to_key<R: CryptoRng + Rng>(&self, rng: R) -> StringToKey {
        StringToKey::new_iterated(rng, self.hash_algorithm, self.s2k_count)
    }

    /// A fresh session key for the default cipher.
    pub fn session_key<R: CryptoRng + Rng>(&self, rng: R) -> Result<SessionKey> {
        SessionKey::new(rng, self.sym_algorithm)
    }

    /// Reads packets, accepting only the algorithms in the registry.
    pub fn packet_parser(&self, input: impl Into<Bytes>) -> PacketParser {
        PacketParser::with_registry(input.into(), self.registry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::default().build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.s2k_count, 96);
        assert_eq!(config.header_version, PacketHeaderVersion::New);

        let config = ConfigBuilder::default()
            .sym_algorithm(SymmetricKeyAlgorithm::CAST5)
            .compression_level(9)
            .build()
            .unwrap();
        assert_eq!(config.sym_algorithm, SymmetricKeyAlgorithm::CAST5);
    }

    #[test]
    fn test_builder_validation() {
        let err = ConfigBuilder::default()
            .compression_level(12)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("compression level"));

        assert!(ConfigBuilder::default()
            .sym_algorithm(SymmetricKeyAlgorithm::Plaintext)
            .build()
            .is_err());
    }

    #[test]
    fn test_registry() {
        let mut registry = AlgorithmRegistry::rfc4880();
        assert_eq!(
            registry.symmetric(SymmetricKeyAlgorithm::AES256),
            Some(&SymmetricInfo {
                name: "AES256",
                block_size: 16,
                key_size: 32
            })
        );
        assert_eq!(registry.hash(HashAlgorithm::Sha1).unwrap().digest_size, 20);
        assert!(registry.check_public_key(PublicKeyAlgorithm::ECDSA).is_err());

        registry.remove_symmetric(SymmetricKeyAlgorithm::IDEA);
        let err = registry
            .check_symmetric(SymmetricKeyAlgorithm::IDEA)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));

        assert!(AlgorithmRegistry::empty()
            .check_hash(HashAlgorithm::Sha256)
            .is_err());
    }

    #[test]
    fn test_string_to_key() {
        use rand::SeedableRng;

        let config = Config::default();
        let s2k = config.string_to_key(rand_chacha::ChaCha8Rng::seed_from_u64(1));
        assert_eq!(s2k.hash_alg(), HashAlgorithm::Sha256);
        assert_eq!(s2k.count(), Some(65536));
        assert!(s2k.salt().is_some());
    }
}
