use dsa::{Components, Signature, SigningKey, VerifyingKey};
use signature::hazmat::PrehashVerifier;
use signature::SignatureEncoding;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::types::{Mpi, SignatureBytes};

/// Smallest cap for the size of `r` and `s`, fitting a 160 bit `q` plus a
/// DER sign octet.
const MIN_COMPONENT_CAP: usize = 21;

/// Builds the verifying key from the public MPIs.
pub fn verifying_key(p: &Mpi, q: &Mpi, g: &Mpi, y: &Mpi) -> Result<VerifyingKey> {
    let components = Components::from_components(p.to_biguint(), q.to_biguint(), g.to_biguint())?;
    let key = VerifyingKey::from_components(components, y.to_biguint())?;
    Ok(key)
}

/// Builds the signing key from the public MPIs and the secret exponent.
pub fn signing_key(p: &Mpi, q: &Mpi, g: &Mpi, y: &Mpi, x: &Mpi) -> Result<SigningKey> {
    let key = SigningKey::from_components(verifying_key(p, q, g, y)?, x.to_biguint())?;
    Ok(key)
}

/// Encodes `(r, s)` as a DER `SEQUENCE OF INTEGER`.
pub fn to_der(r: &Mpi, s: &Mpi) -> Result<Vec<u8>> {
    let sig = Signature::from_components(r.to_biguint(), s.to_biguint())?;
    Ok(sig.to_vec())
}

/// Splits a DER `SEQUENCE OF INTEGER` into `(r, s)`.
pub fn from_der(der: &[u8]) -> Result<(Mpi, Mpi)> {
    let sig = Signature::try_from(der)?;
    Ok((Mpi::from(sig.r()), Mpi::from(sig.s())))
}

/// Sign using DSA with a deterministic nonce (RFC 6979).
pub fn sign(key: &SigningKey, hash: HashAlgorithm, digest: &[u8]) -> Result<SignatureBytes> {
    let signature = match hash {
        HashAlgorithm::Md5 => key.sign_prehashed_rfc6979::<md5::Md5>(digest),
        HashAlgorithm::Sha1 => key.sign_prehashed_rfc6979::<sha1::Sha1>(digest),
        HashAlgorithm::Ripemd160 => key.sign_prehashed_rfc6979::<ripemd::Ripemd160>(digest),
        HashAlgorithm::Sha256 => key.sign_prehashed_rfc6979::<sha2::Sha256>(digest),
        HashAlgorithm::Sha384 => key.sign_prehashed_rfc6979::<sha2::Sha384>(digest),
        HashAlgorithm::Sha512 => key.sign_prehashed_rfc6979::<sha2::Sha512>(digest),
        HashAlgorithm::Sha224 => key.sign_prehashed_rfc6979::<sha2::Sha224>(digest),
        _ => unsupported_err!("DSA signatures with {:?}", hash),
    }?;

    let (r, s) = from_der(&signature.to_vec())?;
    Ok(SignatureBytes::Dsa { r, s })
}

/// Verify a DSA signature.
pub fn verify(
    p: &Mpi,
    q: &Mpi,
    g: &Mpi,
    y: &Mpi,
    hashed: &[u8],
    r: &Mpi,
    s: &Mpi,
) -> Result<()> {
    let cap = MIN_COMPONENT_CAP.max(q.len() + 1);
    ensure!(
        r.len() <= cap && s.len() <= cap,
        "DSA signature components exceed {} bytes",
        cap
    );

    let key = verifying_key(p, q, g, y)?;
    let der = to_der(r, s)?;
    let signature = Signature::try_from(&der[..])?;
    key.verify_prehash(hashed, &signature)?;

    Ok(())
}
