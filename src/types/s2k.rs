use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;

/// Coded count used when none is configured, 65536 octets.
pub(crate) const DEFAULT_ITER_COUNT: u8 = 96;

/// The S2K usage octet of a secret key packet.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.3>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum S2kUsage {
    /// 0: the secret key material is stored in the clear
    Unprotected,
    /// Any other value: the octet is a symmetric cipher id, the key is derived
    /// with a simple MD5 S2K
    LegacyCfb(SymmetricKeyAlgorithm),
    /// 254: CFB encrypted, protected by a SHA-1 hash
    Cfb,
    /// 255: CFB encrypted, protected by a 16-bit additive checksum
    MalleableCfb,
}

impl From<u8> for S2kUsage {
    fn from(value: u8) -> Self {
        match value {
            0 => S2kUsage::Unprotected,
            254 => S2kUsage::Cfb,
            255 => S2kUsage::MalleableCfb,
            alg => S2kUsage::LegacyCfb(SymmetricKeyAlgorithm::from(alg)),
        }
    }
}

impl From<S2kUsage> for u8 {
    fn from(value: S2kUsage) -> Self {
        match value {
            S2kUsage::Unprotected => 0,
            S2kUsage::LegacyCfb(alg) => alg.into(),
            S2kUsage::Cfb => 254,
            S2kUsage::MalleableCfb => 255,
        }
    }
}

/// Available String-To-Key types
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum StringToKeyType {
    Simple = 0,
    Salted = 1,
    Reserved = 2,
    IteratedAndSalted = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

/// A String-To-Key specifier.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
        count: u8,
    },
}

impl StringToKey {
    /// Iterated and salted S2K with a fresh random salt.
    pub fn new_iterated<R: CryptoRng + Rng>(mut rng: R, hash_alg: HashAlgorithm, count: u8) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt);

        StringToKey::IteratedAndSalted {
            hash_alg,
            salt,
            count,
        }
    }

    /// Salted S2K with a fresh random salt.
    pub fn new_salted<R: CryptoRng + Rng>(mut rng: R, hash_alg: HashAlgorithm) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt);

        StringToKey::Salted { hash_alg, salt }
    }

    pub fn typ(&self) -> StringToKeyType {
        match self {
            Self::Simple { .. } => StringToKeyType::Simple,
            Self::Salted { .. } => StringToKeyType::Salted,
            Self::IteratedAndSalted { .. } => StringToKeyType::IteratedAndSalted,
        }
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        match self {
            Self::Simple { hash_alg }
            | Self::Salted { hash_alg, .. }
            | Self::IteratedAndSalted { hash_alg, .. } => *hash_alg,
        }
    }

    pub fn salt(&self) -> Option<&[u8; 8]> {
        match self {
            Self::Simple { .. } => None,
            Self::Salted { salt, .. } | Self::IteratedAndSalted { salt, .. } => Some(salt),
        }
    }

    /// Converts a coded count into the number of octets to hash.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7.1.3>
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::IteratedAndSalted { count, .. } => Some(decode_count(*count)),
            _ => None,
        }
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let typ = StringToKeyType::from(i.read_u8()?);
        let hash_alg = HashAlgorithm::from(i.read_u8()?);

        let s2k = match typ {
            StringToKeyType::Simple => StringToKey::Simple { hash_alg },
            StringToKeyType::Salted => {
                let salt = i.read_array::<8>()?;
                StringToKey::Salted { hash_alg, salt }
            }
            StringToKeyType::IteratedAndSalted => {
                let salt = i.read_array::<8>()?;
                let count = i.read_u8()?;
                StringToKey::IteratedAndSalted {
                    hash_alg,
                    salt,
                    count,
                }
            }
            StringToKeyType::Reserved | StringToKeyType::Other(_) => {
                unsupported_err!("string to key type {:?}", typ)
            }
        };

        Ok(s2k)
    }

    /// Derives a key of `key_size` bytes from the passphrase.
    ///
    /// When one digest is not enough, further hash contexts are run, each
    /// preloaded with one more zero octet than the previous one.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let hash_alg = self.hash_alg();
        let Some(digest_size) = hash_alg.digest_size() else {
            unsupported_err!("string to key with hash {:?}", hash_alg);
        };
        debug!("derive key {:?} (size {})", self.typ(), key_size);

        let rounds = (key_size + digest_size - 1) / digest_size;
        let mut key = Zeroizing::new(Vec::with_capacity(rounds * digest_size));

        for round in 0..rounds {
            let mut hasher = hash_alg.new_hasher()?;
            hasher.update(&vec![0u8; round]);

            match self {
                Self::Simple { .. } => {
                    hasher.update(passphrase);
                }
                Self::Salted { salt, .. } => {
                    hasher.update(salt);
                    hasher.update(passphrase);
                }
                Self::IteratedAndSalted { salt, count, .. } => {
                    let data_len = salt.len() + passphrase.len();
                    // the full salt and passphrase are hashed at least once
                    let count = decode_count(*count).max(data_len);

                    for _ in 0..count / data_len {
                        hasher.update(salt);
                        hasher.update(passphrase);
                    }

                    let tail = count % data_len;
                    if tail > salt.len() {
                        hasher.update(salt);
                        hasher.update(&passphrase[..tail - salt.len()]);
                    } else {
                        hasher.update(&salt[..tail]);
                    }
                }
            }

            key.extend_from_slice(&hasher.finalize());
        }

        key.truncate(key_size);
        Ok(key)
    }

    /// Derives a key sized for the given cipher.
    pub fn derive_key_for(
        &self,
        passphrase: &[u8],
        alg: SymmetricKeyAlgorithm,
    ) -> Result<Zeroizing<Vec<u8>>> {
        ensure!(alg.key_size() > 0, "invalid symmetric algorithm {:?}", alg);
        self.derive_key(passphrase, alg.key_size())
    }
}

fn decode_count(c: u8) -> usize {
    ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.typ().into())?;
        writer.write_u8(self.hash_alg().into())?;

        match self {
            Self::Simple { .. } => {}
            Self::Salted { salt, .. } => {
                writer.write_all(salt)?;
            }
            Self::IteratedAndSalted { salt, count, .. } => {
                writer.write_all(salt)?;
                writer.write_u8(*count)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::Simple { .. } => 2,
            Self::Salted { .. } => 2 + 8,
            Self::IteratedAndSalted { .. } => 2 + 8 + 1,
        }
    }
}
