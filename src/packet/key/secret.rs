use std::io;

use bytes::Buf;
use chrono::{DateTime, Utc};
use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{dsa, elgamal, rsa};
use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait, PubKeyInner, PublicKey, PublicSubkey};
use crate::ser::Serialize;
use crate::types::{
    Fingerprint, KeyId, KeyVersion, Password, PkeskBytes, PlainSecretParams, PublicKeyTrait,
    PublicParams, SecretKeyTrait, SecretParams, SignatureBytes, StringToKey, Tag,
};

/// Secret-Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.3>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretKey {
    packet_header: PacketHeader,
    details: PublicKey,
    secret_params: SecretParams,
}

/// Secret-Subkey Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.4>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretSubkey {
    packet_header: PacketHeader,
    details: PublicSubkey,
    secret_params: SecretParams,
}

fn sign_with(
    public_params: &PublicParams,
    secret: &PlainSecretParams,
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<SignatureBytes> {
    match (public_params, secret) {
        (PublicParams::RSA { n, e }, PlainSecretParams::RSA { d, p, q, .. }) => {
            let key = rsa::private_key(n, e, d, p, q)?;
            rsa::sign(&key, hash, digest)
        }
        (PublicParams::DSA { p, q, g, y }, PlainSecretParams::DSA { x }) => {
            let key = dsa::signing_key(p, q, g, y, x)?;
            dsa::sign(&key, hash, digest)
        }
        _ => bail!("secret key material can not sign"),
    }
}

fn decrypt_with(
    public_params: &PublicParams,
    secret: &PlainSecretParams,
    values: &PkeskBytes,
) -> Result<Zeroizing<Vec<u8>>> {
    match (public_params, secret, values) {
        (PublicParams::RSA { n, e }, PlainSecretParams::RSA { d, p, q, .. }, PkeskBytes::Rsa { mpi }) => {
            let key = rsa::private_key(n, e, d, p, q)?;
            rsa::decrypt(&key, mpi)
        }
        (
            PublicParams::Elgamal { p, .. },
            PlainSecretParams::Elgamal { x },
            PkeskBytes::Elgamal { first, second },
        ) => elgamal::decrypt(p, x, first, second),
        _ => bail!("session key values do not match the secret key"),
    }
}

macro_rules! impl_secret_key {
    ($name:ident, $details:ident, $tag:expr) => {
        impl $name {
            /// Combines the public key with its secret material. The header keeps
            /// the version of the public key packet.
            pub fn new(details: $details, secret_params: SecretParams) -> Self {
                let len = details.write_len() + secret_params.write_len();
                let packet_header =
                    PacketHeader::new_for_body(details.packet_header().version(), $tag, len);

                $name {
                    packet_header,
                    details,
                    secret_params,
                }
            }

            /// Parses the packet body.
            ///
            /// Encrypted secret material is kept as is until it is unlocked.
            pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
                let inner = PubKeyInner::from_buf(&mut input)?;
                let secret_params = SecretParams::from_buf(inner.public_params(), &mut input)?;
                let details = $details::from_inner(packet_header.version(), inner);

                Ok($name {
                    packet_header,
                    details,
                    secret_params,
                })
            }

            pub fn secret_params(&self) -> &SecretParams {
                &self.secret_params
            }

            pub fn public_key(&self) -> &$details {
                &self.details
            }

            /// Returns the secret MPIs, decrypting them with `key_pw` if needed.
            ///
            /// A wrong passphrase fails with
            /// [`crate::errors::Error::ChecksumMismatch`].
            pub fn unlock(&self, key_pw: &Password) -> Result<PlainSecretParams> {
                self.secret_params.unlock(
                    &key_pw.read(),
                    self.details.version(),
                    self.details.public_params(),
                )
            }

            /// Protects the plain secret material with a passphrase.
            pub fn encrypt<R: CryptoRng + Rng>(
                &self,
                rng: R,
                key_pw: &Password,
                sym_alg: SymmetricKeyAlgorithm,
                s2k: StringToKey,
            ) -> Result<Self> {
                let SecretParams::Plain(plain) = &self.secret_params else {
                    bail!("secret key material is already encrypted");
                };
                let encrypted = plain.encrypt(
                    rng,
                    &key_pw.read(),
                    self.details.version(),
                    sym_alg,
                    s2k,
                )?;
                debug!("protected {} with {:?}", self.key_id(), sym_alg);

                Ok(Self::new(
                    self.details.clone(),
                    SecretParams::Encrypted(encrypted),
                ))
            }

            /// Stores the secret material without protection.
            pub fn remove_password(&self, key_pw: &Password) -> Result<Self> {
                let plain = self.unlock(key_pw)?;
                Ok(Self::new(self.details.clone(), SecretParams::Plain(plain)))
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.details.to_writer(writer)?;
                self.secret_params.to_writer(writer)
            }

            fn write_len(&self) -> usize {
                self.details.write_len() + self.secret_params.write_len()
            }
        }

        impl PacketTrait for $name {
            fn packet_header(&self) -> &PacketHeader {
                &self.packet_header
            }
        }

        impl PublicKeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.details.version()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.details.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.details.created_at()
            }

            fn expiration(&self) -> Option<u16> {
                self.details.expiration()
            }

            fn public_params(&self) -> &PublicParams {
                self.details.public_params()
            }

            fn fingerprint(&self) -> Fingerprint {
                self.details.fingerprint()
            }

            fn key_id(&self) -> KeyId {
                self.details.key_id()
            }

            fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.details.serialize_for_hashing(writer)
            }
        }

        impl SecretKeyTrait for $name {
            fn create_signature(
                &self,
                key_pw: &Password,
                hash: HashAlgorithm,
                digest: &[u8],
            ) -> Result<SignatureBytes> {
                ensure!(
                    self.algorithm().can_sign(),
                    "{:?} keys can not sign",
                    self.algorithm()
                );
                let secret = self.unlock(key_pw)?;
                sign_with(self.public_params(), &secret, hash, digest)
            }

            fn decrypt_session_key(
                &self,
                key_pw: &Password,
                values: &PkeskBytes,
            ) -> Result<Zeroizing<Vec<u8>>> {
                let secret = self.unlock(key_pw)?;
                decrypt_with(self.public_params(), &secret, values)
            }
        }
    };
}

impl_secret_key!(SecretKey, PublicKey, Tag::SecretKey);
impl_secret_key!(SecretSubkey, PublicSubkey, Tag::SecretSubkey);

#[cfg(test)]
mod tests {
    use ::rsa::traits::{PrivateKeyParts, PublicKeyParts};
    use ::rsa::RsaPrivateKey;
    use chrono::TimeZone;
    use num_bigint::ModInverse;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::Error;
    use crate::types::{Mpi, PacketHeaderVersion, S2kUsage};

    fn rsa_secret_key(version: KeyVersion) -> SecretKey {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let created = Utc.timestamp_opt(0x5000_0000, 0).single().unwrap();
        let expiration = version.is_legacy().then_some(0);

        let public = PublicKey::new(
            PacketHeaderVersion::Old,
            version,
            PublicKeyAlgorithm::RSA,
            created,
            expiration,
            PublicParams::RSA {
                n: key.n().into(),
                e: key.e().into(),
            },
        )
        .unwrap();
        let primes = key.primes();
        let secret = PlainSecretParams::RSA {
            d: key.d().into(),
            p: Mpi::from(&primes[0]),
            q: Mpi::from(&primes[1]),
            u: primes[0]
                .clone()
                .mod_inverse(&primes[1])
                .unwrap()
                .to_biguint()
                .unwrap()
                .into(),
        };

        SecretKey::new(public, SecretParams::Plain(secret))
    }

    #[test]
    fn test_roundtrip_plain() {
        let key = rsa_secret_key(KeyVersion::V4);
        let body = key.to_bytes().unwrap();
        assert_eq!(body.len(), key.write_len());

        let back = SecretKey::from_buf(*key.packet_header(), &body[..]).unwrap();
        assert_eq!(back, key);
        assert_eq!(back.key_id(), key.public_key().key_id());
    }

    #[test]
    fn test_plain_checksum_mismatch() {
        let key = rsa_secret_key(KeyVersion::V4);
        let mut body = key.to_bytes().unwrap();
        let last = body.len() - 1;
        body[last] ^= 0x01;

        let err = SecretKey::from_buf(*key.packet_header(), &body[..]).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_encrypt_unlock() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        for (version, s2k) in [
            (
                KeyVersion::V4,
                StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 96),
            ),
            (
                KeyVersion::V3,
                StringToKey::Simple {
                    hash_alg: HashAlgorithm::Md5,
                },
            ),
        ] {
            let key = rsa_secret_key(version);
            let plain = key.unlock(&Password::empty()).unwrap();

            let locked = key
                .encrypt(&mut rng, &"hunter2".into(), SymmetricKeyAlgorithm::CAST5, s2k)
                .unwrap();
            assert!(locked.secret_params().is_encrypted());

            // serialized form survives a round trip while still locked
            let body = locked.to_bytes().unwrap();
            let parsed = SecretKey::from_buf(*locked.packet_header(), &body[..]).unwrap();
            assert_eq!(parsed, locked);
            if version == KeyVersion::V3 {
                let SecretParams::Encrypted(params) = parsed.secret_params() else {
                    panic!("expected encrypted params");
                };
                assert_eq!(params.usage, S2kUsage::LegacyCfb(SymmetricKeyAlgorithm::CAST5));
            }

            assert_eq!(parsed.unlock(&"hunter2".into()).unwrap(), plain);
            let err = parsed.unlock(&"wrong".into()).unwrap_err();
            assert!(err.is_integrity_failure(), "{:?}", err);

            let open = parsed.remove_password(&"hunter2".into()).unwrap();
            assert_eq!(open, key);
        }
    }

    #[test]
    fn test_encrypt_twice_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = rsa_secret_key(KeyVersion::V4);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha1, 96);
        let locked = key
            .encrypt(&mut rng, &"a".into(), SymmetricKeyAlgorithm::AES128, s2k.clone())
            .unwrap();
        assert!(locked
            .encrypt(&mut rng, &"a".into(), SymmetricKeyAlgorithm::AES128, s2k)
            .is_err());
    }

    #[test]
    fn test_sign_and_decrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let key = rsa_secret_key(KeyVersion::V4);

        let digest = HashAlgorithm::Sha256.digest(b"hello").unwrap();
        let sig = key
            .create_signature(&Password::empty(), HashAlgorithm::Sha256, &digest)
            .unwrap();
        key.public_key()
            .verify_signature(HashAlgorithm::Sha256, &digest, &sig)
            .unwrap();

        let values = key.public_key().encrypt_session_key(&mut rng, b"payload").unwrap();
        let plain = key.decrypt_session_key(&Password::empty(), &values).unwrap();
        assert_eq!(&plain[..], b"payload");
    }
}
