use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use log::debug;

use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::mpi::mpi_byte_len;
use crate::types::{KeyVersion, PlainSecretParams, PublicParams, S2kUsage, StringToKey};

/// Length of the SHA-1 hash protecting secret key material under S2K usage 254.
const SHA1_LEN: usize = 20;

/// Secret key material protected by a passphrase.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    /// The identifier for how this data is stored.
    pub usage: S2kUsage,
    /// The encryption algorithm used.
    pub sym_alg: SymmetricKeyAlgorithm,
    /// The string-to-key method and its parameters. Implicitly simple MD5 for
    /// legacy usage octets, in which case it is not written.
    pub s2k: StringToKey,
    #[debug("{}", hex::encode(iv))]
    pub iv: Bytes,
    /// The encrypted data, including the checksum.
    #[debug("{}", hex::encode(data))]
    pub data: Bytes,
}

/// CFB resynchronisation between V3 MPIs: the next IV is made of the last
/// block size bytes of the IV followed by the ciphertext so far.
pub(crate) fn resync_iv(iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let bs = iv.len();
    let mut state = Vec::with_capacity(bs + ciphertext.len());
    state.extend_from_slice(iv);
    state.extend_from_slice(ciphertext);
    state.split_off(state.len() - bs)
}

impl EncryptedSecretParams {
    /// Reads everything after the usage octet.
    pub fn from_buf<B: Buf>(usage: S2kUsage, mut i: B) -> Result<Self> {
        let (sym_alg, s2k) = match usage {
            S2kUsage::Unprotected => bail!("unprotected secret key material is not encrypted"),
            S2kUsage::LegacyCfb(sym_alg) => (
                sym_alg,
                StringToKey::Simple {
                    hash_alg: HashAlgorithm::Md5,
                },
            ),
            S2kUsage::Cfb | S2kUsage::MalleableCfb => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let s2k = StringToKey::from_buf(&mut i)?;
                (sym_alg, s2k)
            }
        };

        let bs = sym_alg.block_size();
        if bs == 0 {
            unsupported_err!("secret key encrypted with {:?}", sym_alg);
        }
        let iv = i.read_take(bs)?;
        let data = i.rest();

        Ok(EncryptedSecretParams {
            usage,
            sym_alg,
            s2k,
            iv,
            data,
        })
    }

    /// Decrypts the secret key material and validates its checksum.
    ///
    /// A wrong passphrase is reported as [`crate::errors::Error::ChecksumMismatch`].
    pub fn unlock(
        &self,
        passphrase: &[u8],
        version: KeyVersion,
        public_params: &PublicParams,
    ) -> Result<PlainSecretParams> {
        debug!("unlocking {:?} secret key ({:?})", version, self.usage);
        let key = self.s2k.derive_key_for(passphrase, self.sym_alg)?;

        match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                if self.usage == S2kUsage::Cfb {
                    unsupported_err!("SHA1 protected secret keys of version {:?}", version);
                }
                self.unlock_legacy(&key, public_params)
            }
            KeyVersion::V4 => {
                let mut plaintext = self.data.to_vec();
                self.sym_alg
                    .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

                let check_len = match self.usage {
                    S2kUsage::Cfb => SHA1_LEN,
                    _ => 2,
                };
                ensure!(
                    plaintext.len() >= check_len,
                    "secret key material too short"
                );
                let (mpis, check) = plaintext.split_at(plaintext.len() - check_len);

                match self.usage {
                    S2kUsage::Cfb => checksum::sha1(check, mpis, "secret key")?,
                    _ => checksum::simple(
                        u16::from_be_bytes([check[0], check[1]]),
                        mpis,
                        "secret key",
                    )?,
                }

                let mut mpis = mpis;
                let params = PlainSecretParams::from_buf(public_params, &mut mpis)?;
                ensure!(mpis.is_empty(), "trailing bytes in secret key material");

                Ok(params)
            }
            KeyVersion::Other(v) => unsupported_err!("secret key version {}", v),
        }
    }

    fn unlock_legacy(&self, key: &[u8], public_params: &PublicParams) -> Result<PlainSecretParams> {
        let mut data = self.data.clone();
        let mut state = self.iv.to_vec();
        let mut plaintext = Vec::with_capacity(data.len());

        for _ in 0..PlainSecretParams::mpi_count(public_params) {
            let bits = data.read_be_u16()?;
            let ciphertext = data.read_take(mpi_byte_len(bits))?;

            let mut body = ciphertext.to_vec();
            self.sym_alg
                .decrypt_with_iv_regular(key, &state, &mut body)?;
            state = resync_iv(&state, &ciphertext);

            plaintext.extend_from_slice(&bits.to_be_bytes());
            plaintext.extend_from_slice(&body);
        }

        let actual = data.read_be_u16()?;
        ensure!(data.is_empty(), "trailing bytes in secret key material");
        checksum::simple(actual, &plaintext, "secret key")?;

        PlainSecretParams::from_buf(public_params, &plaintext[..])
    }
}

impl Serialize for EncryptedSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.usage.into())?;
        match self.usage {
            S2kUsage::Unprotected => bail!("encrypted secret params with unprotected usage"),
            S2kUsage::LegacyCfb(_) => {}
            S2kUsage::Cfb | S2kUsage::MalleableCfb => {
                writer.write_u8(self.sym_alg.into())?;
                self.s2k.to_writer(writer)?;
            }
        }
        writer.write_all(&self.iv)?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = 1;
        if matches!(self.usage, S2kUsage::Cfb | S2kUsage::MalleableCfb) {
            sum += 1 + self.s2k.write_len();
        }
        sum + self.iv.len() + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resync_iv() {
        assert_eq!(resync_iv(&[1, 2, 3, 4], &[5, 6]), vec![3, 4, 5, 6]);
        assert_eq!(resync_iv(&[1, 2, 3, 4], &[5, 6, 7, 8, 9]), vec![6, 7, 8, 9]);
        assert_eq!(resync_iv(&[1, 2, 3, 4], &[]), vec![1, 2, 3, 4]);
    }
}
