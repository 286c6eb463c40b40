use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{cipher::KeyIvInit, BufDecryptor, BufEncryptor};
use cipher::{BlockCipher, BlockEncryptMut};
use des::TdesEde3;
use idea::Idea;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use twofish::Twofish;
use zeroize::Zeroizing;

use crate::errors::{Error, Result};

/// Runs `$body` with `$cipher` bound to the block cipher type of `$alg`.
macro_rules! with_cipher {
    ($alg:expr, $cipher:ident => $body:expr) => {
        match $alg {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => {
                type $cipher = Idea;
                $body
            }
            SymmetricKeyAlgorithm::TripleDES => {
                type $cipher = TdesEde3;
                $body
            }
            SymmetricKeyAlgorithm::CAST5 => {
                type $cipher = Cast5;
                $body
            }
            SymmetricKeyAlgorithm::Blowfish => {
                type $cipher = Blowfish;
                $body
            }
            SymmetricKeyAlgorithm::AES128 => {
                type $cipher = Aes128;
                $body
            }
            SymmetricKeyAlgorithm::AES192 => {
                type $cipher = Aes192;
                $body
            }
            SymmetricKeyAlgorithm::AES256 => {
                type $cipher = Aes256;
                $body
            }
            SymmetricKeyAlgorithm::Twofish => {
                type $cipher = Twofish;
                $body
            }
            SymmetricKeyAlgorithm::Camellia128 => {
                type $cipher = Camellia128;
                $body
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                type $cipher = Camellia192;
                $body
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                type $cipher = Camellia256;
                $body
            }
            SymmetricKeyAlgorithm::Other(id) => {
                unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", id)
            }
        }
    };
}

/// Legacy format using OpenPGP CFB Mode
///
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-13.9>
fn encrypt_resync<MODE>(key: &[u8], iv: &[u8], prefix: &mut [u8], data: &mut [u8]) -> Result<()>
where
    MODE: BlockEncryptMut + BlockCipher,
    BufEncryptor<MODE>: KeyIvInit,
{
    let mut mode = BufEncryptor::<MODE>::new_from_slices(key, iv)?;
    mode.encrypt(prefix);

    // resync
    let mut mode = BufEncryptor::<MODE>::new_from_slices(key, &prefix[2..])?;
    mode.encrypt(data);

    Ok(())
}

fn decrypt_resync<MODE>(key: &[u8], iv: &[u8], prefix: &mut [u8], data: &mut [u8]) -> Result<()>
where
    MODE: BlockEncryptMut + BlockCipher,
    BufDecryptor<MODE>: KeyIvInit,
{
    // the resync IV is taken from the ciphertext
    let encrypted_prefix = prefix[2..].to_vec();

    let mut mode = BufDecryptor::<MODE>::new_from_slices(key, iv)?;
    mode.decrypt(prefix);

    let mut mode = BufDecryptor::<MODE>::new_from_slices(key, &encrypted_prefix)?;
    mode.decrypt(data);

    Ok(())
}

fn encrypt_regular<MODE>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    MODE: BlockEncryptMut + BlockCipher,
    BufEncryptor<MODE>: KeyIvInit,
{
    BufEncryptor::<MODE>::new_from_slices(key, iv)?.encrypt(data);
    Ok(())
}

fn decrypt_regular<MODE>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    MODE: BlockEncryptMut + BlockCipher,
    BufDecryptor<MODE>: KeyIvInit,
{
    BufDecryptor::<MODE>::new_from_slices(key, iv)?.decrypt(data);
    Ok(())
}

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.2>
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    #[cfg_attr(test, proptest(skip))]
    Plaintext = 0,
    /// IDEA
    IDEA = 1,
    /// Triple-DES
    TripleDES = 2,
    /// CAST5
    CAST5 = 3,
    /// Blowfish
    Blowfish = 4,
    // 5 & 6 are reserved for DES/SK
    /// AES with 128-bit key
    AES128 = 7,
    /// AES with 192-bit key
    AES192 = 8,
    /// AES with 256-bit key
    AES256 = 9,
    /// Twofish with 256-bit key
    Twofish = 10,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 128-bit key
    Camellia128 = 11,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 192-bit key
    Camellia192 = 12,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 256-bit key
    Camellia256 = 13,

    #[num_enum(catch_all)]
    Other(#[cfg_attr(test, proptest(strategy = "14u8.."))] u8),
}

#[allow(clippy::derivable_impls)]
impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES128
    }
}

impl zeroize::DefaultIsZeroes for SymmetricKeyAlgorithm {}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    /// Based on <https://github.com/gpg/libgcrypt/blob/master/cipher>
    pub const fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA => 8,
            SymmetricKeyAlgorithm::TripleDES => 8,
            SymmetricKeyAlgorithm::CAST5 => 8,
            SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 16,
            SymmetricKeyAlgorithm::AES256 => 16,
            SymmetricKeyAlgorithm::Twofish => 16,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 16,
            SymmetricKeyAlgorithm::Camellia256 => 16,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of a key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA => 16,
            SymmetricKeyAlgorithm::TripleDES => 24,
            SymmetricKeyAlgorithm::CAST5 => 16,
            SymmetricKeyAlgorithm::Blowfish => 16,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 => 32,
            SymmetricKeyAlgorithm::Twofish => 32,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Camellia256 => 32,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    fn ensure_cipher(self) -> Result<usize> {
        let bs = self.block_size();
        if bs == 0 {
            unsupported_err!("symmetric algorithm {:?} can not encrypt", self);
        }
        Ok(bs)
    }

    /// Encrypt the data in OpenPGP CFB mode.
    ///
    /// OpenPGP CFB mode uses an initialization vector (IV) of all zeros, and
    /// prefixes the plaintext with BS+2 octets of random data, such that
    /// octets BS+1 and BS+2 match octets BS-1 and BS. It does a CFB
    /// resynchronization after encrypting those BS+2 octets.
    pub fn encrypt<R: CryptoRng + Rng>(
        self,
        mut rng: R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        debug!("encrypt unprotected");
        let bs = self.ensure_cipher()?;

        let prefix_len = bs + 2;
        let mut ciphertext = vec![0u8; prefix_len + plaintext.len()];

        // prefix
        rng.fill_bytes(&mut ciphertext[..bs]);

        // add quick check
        ciphertext[bs] = ciphertext[bs - 2];
        ciphertext[bs + 1] = ciphertext[bs - 1];

        // plaintext
        ciphertext[prefix_len..].copy_from_slice(plaintext);

        let iv = vec![0u8; bs];
        let (prefix, data) = ciphertext.split_at_mut(prefix_len);
        with_cipher!(self, C => encrypt_resync::<C>(key, &iv, prefix, data))?;

        Ok(ciphertext)
    }

    /// Decrypt data produced by [`SymmetricKeyAlgorithm::encrypt`].
    ///
    /// Fails with [`Error::SessionKeyMismatch`] when the quick check bytes
    /// of the random prefix do not repeat, which almost always means the key
    /// is wrong.
    pub fn decrypt(self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        debug!("decrypt unprotected");
        let bs = self.ensure_cipher()?;

        let prefix_len = bs + 2;
        ensure!(
            ciphertext.len() >= prefix_len,
            "encrypted data too short: {} bytes",
            ciphertext.len()
        );

        let mut plaintext = ciphertext.to_vec();
        let iv = vec![0u8; bs];
        {
            let (prefix, data) = plaintext.split_at_mut(prefix_len);
            with_cipher!(self, C => decrypt_resync::<C>(key, &iv, prefix, data))?;

            if prefix[bs - 2..bs] != prefix[bs..] {
                return Err(Error::SessionKeyMismatch);
            }
        }

        plaintext.drain(..prefix_len);
        Ok(plaintext)
    }

    /// Encrypt the data using CFB mode, without padding. Overwrites the input.
    /// This is regular CFB, not OpenPGP CFB.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], plaintext: &mut [u8]) -> Result<()> {
        self.ensure_cipher()?;
        with_cipher!(self, C => encrypt_regular::<C>(key, iv, plaintext))
    }

    /// Decrypt the data using CFB mode, without padding. Overwrites the input.
    /// This is regular CFB, not OpenPGP CFB.
    pub fn decrypt_with_iv_regular(
        self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &mut [u8],
    ) -> Result<()> {
        self.ensure_cipher()?;
        with_cipher!(self, C => decrypt_regular::<C>(key, iv, ciphertext))
    }

    /// Generate a new session key.
    pub fn new_session_key<R: Rng + CryptoRng>(self, mut rng: R) -> Zeroizing<Vec<u8>> {
        let mut session_key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut session_key);
        session_key
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_wrong_key_fails_quick_check() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = alg.new_session_key(&mut rng);
        let ciphertext = alg.encrypt(&mut rng, &key, b"hello world").unwrap();
        assert_eq!(ciphertext.len(), 16 + 2 + 11);

        assert_eq!(alg.decrypt(&key, &ciphertext).unwrap(), b"hello world");

        // find a key that is rejected; a random key passes the check with p=2^-16
        let mut rejected = false;
        for _ in 0..8 {
            let other = alg.new_session_key(&mut rng);
            if let Err(err) = alg.decrypt(&other, &ciphertext) {
                assert!(matches!(err, Error::SessionKeyMismatch));
                rejected = true;
                break;
            }
        }
        assert!(rejected);
    }

    #[test]
    fn test_regular_cfb_zero_iv() {
        let alg = SymmetricKeyAlgorithm::CAST5;
        let key = [7u8; 16];
        let iv = [0u8; 8];
        let mut data = b"secret session key".to_vec();
        alg.encrypt_with_iv_regular(&key, &iv, &mut data).unwrap();
        assert_ne!(&data[..], b"secret session key");
        alg.decrypt_with_iv_regular(&key, &iv, &mut data).unwrap();
        assert_eq!(&data[..], b"secret session key");
    }

    #[test]
    fn test_plaintext_is_not_a_cipher() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(SymmetricKeyAlgorithm::Plaintext
            .encrypt(&mut rng, &[], b"x")
            .is_err());
        assert!(SymmetricKeyAlgorithm::Other(99)
            .decrypt(&[], &[0u8; 20])
            .is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn openpgp_cfb_roundtrip(alg: SymmetricKeyAlgorithm, data: Vec<u8>, seed: u64) {
            prop_assume!(alg.block_size() > 0);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let key = alg.new_session_key(&mut rng);

            let ciphertext = alg.encrypt(&mut rng, &key, &data).unwrap();
            prop_assert_eq!(ciphertext.len(), alg.block_size() + 2 + data.len());
            let plaintext = alg.decrypt(&key, &ciphertext).unwrap();
            prop_assert_eq!(plaintext, data);
        }
    }
}
