use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use rand::{CryptoRng, Rng};

use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{EncryptedSecretParams, KeyVersion, Mpi, PublicParams, S2kUsage, StringToKey};

use super::encrypted_secret::resync_iv;

/// Unencrypted secret key material.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.3>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PlainSecretParams {
    RSA {
        #[debug("..")]
        d: Mpi,
        #[debug("..")]
        p: Mpi,
        #[debug("..")]
        q: Mpi,
        #[debug("..")]
        u: Mpi,
    },
    DSA {
        #[debug("..")]
        x: Mpi,
    },
    Elgamal {
        #[debug("..")]
        x: Mpi,
    },
}

impl PlainSecretParams {
    /// Reads the secret MPIs matching the given public parameters,
    /// without any checksum.
    pub fn from_buf<B: Buf>(public_params: &PublicParams, mut i: B) -> Result<Self> {
        let params = match public_params {
            PublicParams::RSA { .. } => {
                let d = Mpi::from_buf(&mut i)?;
                let p = Mpi::from_buf(&mut i)?;
                let q = Mpi::from_buf(&mut i)?;
                let u = Mpi::from_buf(&mut i)?;
                PlainSecretParams::RSA { d, p, q, u }
            }
            PublicParams::DSA { .. } => PlainSecretParams::DSA {
                x: Mpi::from_buf(&mut i)?,
            },
            PublicParams::Elgamal { .. } => PlainSecretParams::Elgamal {
                x: Mpi::from_buf(&mut i)?,
            },
        };

        Ok(params)
    }

    /// Number of MPIs stored for the given public parameters.
    pub(crate) fn mpi_count(public_params: &PublicParams) -> usize {
        match public_params {
            PublicParams::RSA { .. } => 4,
            PublicParams::DSA { .. } | PublicParams::Elgamal { .. } => 1,
        }
    }

    pub fn mpis(&self) -> Vec<&Mpi> {
        match self {
            PlainSecretParams::RSA { d, p, q, u } => vec![d, p, q, u],
            PlainSecretParams::DSA { x } | PlainSecretParams::Elgamal { x } => vec![x],
        }
    }

    /// Additive checksum over the encoded MPIs.
    pub fn checksum_simple(&self) -> Result<u16> {
        Ok(checksum::calculate_simple(&self.to_bytes()?))
    }

    /// Encrypts the secret MPIs under a key derived from `passphrase`.
    ///
    /// V4 keys encrypt the MPIs and checksum as one CFB stream (S2K usage 255).
    /// V2 and V3 keys encrypt every MPI body on its own, leaving the bit counts
    /// and the checksum in the clear. For those a simple MD5 S2K is written as
    /// a bare cipher id in the usage octet.
    pub fn encrypt<R: CryptoRng + Rng>(
        &self,
        mut rng: R,
        passphrase: &[u8],
        version: KeyVersion,
        sym_alg: SymmetricKeyAlgorithm,
        s2k: StringToKey,
    ) -> Result<EncryptedSecretParams> {
        let key = s2k.derive_key_for(passphrase, sym_alg)?;
        let bs = sym_alg.block_size();

        let mut iv = vec![0u8; bs];
        rng.fill_bytes(&mut iv);

        let checksum = self.checksum_simple()?;

        let (usage, data) = match version {
            KeyVersion::V4 => {
                let mut data = self.to_bytes()?;
                data.write_u16::<BigEndian>(checksum)?;
                sym_alg.encrypt_with_iv_regular(&key, &iv, &mut data)?;

                (S2kUsage::MalleableCfb, data)
            }
            KeyVersion::V2 | KeyVersion::V3 => {
                let mut data = Vec::new();
                let mut state = iv.clone();
                for mpi in self.mpis() {
                    let mut body = mpi.as_ref().to_vec();
                    sym_alg.encrypt_with_iv_regular(&key, &state, &mut body)?;

                    data.write_u16::<BigEndian>(mpi.bit_len().try_into()?)?;
                    data.extend_from_slice(&body);
                    state = resync_iv(&state, &body);
                }
                data.write_u16::<BigEndian>(checksum)?;

                let usage = match s2k {
                    StringToKey::Simple {
                        hash_alg: HashAlgorithm::Md5,
                    } => S2kUsage::LegacyCfb(sym_alg),
                    _ => S2kUsage::MalleableCfb,
                };
                (usage, data)
            }
            KeyVersion::Other(v) => unsupported_err!("encryption for key version {}", v),
        };

        Ok(EncryptedSecretParams {
            usage,
            sym_alg,
            s2k,
            iv: iv.into(),
            data: data.into(),
        })
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for mpi in self.mpis() {
            mpi.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.mpis().iter().map(|m| m.write_len()).sum()
    }
}
