use std::io;

use chrono::{DateTime, Utc};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{dsa, elgamal, rsa};
use crate::errors::Result;
use crate::types::{
    Fingerprint, KeyId, KeyVersion, Password, PkeskBytes, PublicParams, SignatureBytes,
};

/// Shared behaviour of public keys and subkeys.
pub trait PublicKeyTrait: std::fmt::Debug {
    fn version(&self) -> KeyVersion;

    fn algorithm(&self) -> PublicKeyAlgorithm;

    fn created_at(&self) -> &DateTime<Utc>;

    /// Validity period in days, V2 and V3 keys only.
    fn expiration(&self) -> Option<u16>;

    fn public_params(&self) -> &PublicParams;

    fn fingerprint(&self) -> Fingerprint;

    fn key_id(&self) -> KeyId;

    /// Writes the key the way it is covered by certification and binding
    /// signatures: `0x99 || u16 length || public key body`.
    fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()>;

    /// Verify a signature over the given (already hashed) data.
    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        hashed: &[u8],
        sig: &SignatureBytes,
    ) -> Result<()> {
        match (self.public_params(), sig) {
            (PublicParams::RSA { n, e }, SignatureBytes::Rsa(s)) => {
                rsa::verify(n, e, hash, hashed, s)
            }
            (PublicParams::DSA { p, q, g, y }, SignatureBytes::Dsa { r, s }) => {
                dsa::verify(p, q, g, y, hashed, r, s)
            }
            _ => bail!(
                "signature does not match the {:?} key material",
                self.algorithm()
            ),
        }
    }

    /// Encrypts the already framed session key plaintext to this key.
    fn encrypt_session_key<R: CryptoRng + Rng>(
        &self,
        rng: R,
        plain: &[u8],
    ) -> Result<PkeskBytes> {
        ensure!(
            self.algorithm().can_encrypt(),
            "{:?} keys can not encrypt",
            self.algorithm()
        );

        match self.public_params() {
            PublicParams::RSA { n, e } => rsa::encrypt(rng, n, e, plain),
            PublicParams::Elgamal { p, g, y } => elgamal::encrypt(rng, p, g, y, plain),
            PublicParams::DSA { .. } => bail!("DSA keys can not encrypt"),
        }
    }
}

/// Operations needing the secret key material.
pub trait SecretKeyTrait: PublicKeyTrait {
    /// Signs the given digest, unlocking the key with `key_pw` when it is
    /// protected.
    fn create_signature(
        &self,
        key_pw: &Password,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<SignatureBytes>;

    /// Decrypts public key encrypted session key material, returning the
    /// framed plaintext.
    fn decrypt_session_key(
        &self,
        key_pw: &Password,
        values: &PkeskBytes,
    ) -> Result<Zeroizing<Vec<u8>>>;
}
