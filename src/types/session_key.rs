use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;

/// A symmetric session key together with the cipher it is meant for.
///
/// Not framed on the wire by itself, it is carried by the session key packets.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SessionKey {
    pub sym_algorithm: SymmetricKeyAlgorithm,
    #[debug("..")]
    pub key: Zeroizing<Vec<u8>>,
}

impl SessionKey {
    /// Generates a fresh random key for `sym_algorithm`.
    pub fn new<R: CryptoRng + Rng>(rng: R, sym_algorithm: SymmetricKeyAlgorithm) -> Result<Self> {
        ensure!(
            sym_algorithm.key_size() > 0,
            "can not generate a session key for {:?}",
            sym_algorithm
        );

        Ok(SessionKey {
            sym_algorithm,
            key: sym_algorithm.new_session_key(rng),
        })
    }

    /// Wraps existing key material, checking its length against the cipher.
    pub fn from_parts(sym_algorithm: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Self> {
        let expected = sym_algorithm.key_size();
        if expected == 0 {
            unsupported_err!("session key for {:?}", sym_algorithm);
        }
        ensure_eq!(key.len(), expected, "invalid session key length");

        Ok(SessionKey {
            sym_algorithm,
            key: Zeroizing::new(key.to_vec()),
        })
    }

    /// Additive checksum over the raw key.
    pub fn checksum(&self) -> u16 {
        checksum::calculate_simple(&self.key)
    }

    /// `algorithm || key || checksum`, the plaintext wrapped by public key encryption.
    pub(crate) fn to_pkesk_plaintext(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(self.key.len() + 3));
        out.push(self.sym_algorithm.into());
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.checksum().to_be_bytes());
        out
    }

    /// Reverses [`SessionKey::to_pkesk_plaintext`], validating the checksum.
    pub(crate) fn from_pkesk_plaintext(plain: &[u8]) -> Result<Self> {
        ensure!(plain.len() > 3, "session key plaintext too short");
        let alg = SymmetricKeyAlgorithm::from(plain[0]);
        let (key, check) = plain[1..].split_at(plain.len() - 3);
        checksum::simple(
            u16::from_be_bytes([check[0], check[1]]),
            key,
            "session key",
        )?;

        Self::from_parts(alg, key)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_pkesk_plaintext() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sk = SessionKey::new(&mut rng, SymmetricKeyAlgorithm::AES256).unwrap();
        assert_eq!(sk.key.len(), 32);

        let mut plain = sk.to_pkesk_plaintext();
        assert_eq!(plain.len(), 35);
        assert_eq!(plain[0], 9);
        assert_eq!(SessionKey::from_pkesk_plaintext(&plain).unwrap(), sk);

        plain[5] ^= 0x01;
        let err = SessionKey::from_pkesk_plaintext(&plain).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_from_parts_length() {
        assert!(SessionKey::from_parts(SymmetricKeyAlgorithm::CAST5, &[0u8; 16]).is_ok());
        assert!(SessionKey::from_parts(SymmetricKeyAlgorithm::CAST5, &[0u8; 15]).is_err());
        assert!(SessionKey::from_parts(SymmetricKeyAlgorithm::Plaintext, &[]).is_err());
        assert!(SessionKey::new(ChaCha8Rng::seed_from_u64(0), SymmetricKeyAlgorithm::Other(77)).is_err());
    }
}
