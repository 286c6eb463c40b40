use log::debug;
use rand::{CryptoRng, Rng};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::types::{Mpi, PkeskBytes, SignatureBytes};

/// Largest modulus accepted, matching the MPI size limit.
const MAX_KEY_BITS: usize = 16384;

fn public_key(n: &Mpi, e: &Mpi) -> Result<RsaPublicKey> {
    let key = RsaPublicKey::new_with_max_size(n.to_biguint(), e.to_biguint(), MAX_KEY_BITS)?;
    Ok(key)
}

/// Assembles a private key from the public and secret MPIs.
pub fn private_key(n: &Mpi, e: &Mpi, d: &Mpi, p: &Mpi, q: &Mpi) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::from_components(
        n.to_biguint(),
        e.to_biguint(),
        d.to_biguint(),
        vec![p.to_biguint(), q.to_biguint()],
    )?;
    Ok(key)
}

fn sign_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let scheme = match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Ripemd160 => Pkcs1v15Sign::new::<ripemd::Ripemd160>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        _ => unsupported_err!("RSA signatures with {:?}", hash),
    };
    Ok(scheme)
}

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(priv_key: &RsaPrivateKey, mpi: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
    let ciphertext = mpi.to_padded(priv_key.size())?;
    let m = priv_key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;

    Ok(Zeroizing::new(m))
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    mut rng: R,
    n: &Mpi,
    e: &Mpi,
    plaintext: &[u8],
) -> Result<PkeskBytes> {
    debug!("RSA encrypt");

    let key = public_key(n, e)?;
    let data = key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)?;

    Ok(PkeskBytes::Rsa {
        mpi: Mpi::from_slice(&data),
    })
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &Mpi, e: &Mpi, hash: HashAlgorithm, hashed: &[u8], sig: &Mpi) -> Result<()> {
    let key = public_key(n, e)?;
    // leading zeros are stripped on the wire
    let sig = sig.to_padded(key.size())?;

    key.verify(sign_scheme(hash)?, hashed, &sig)?;
    Ok(())
}

/// Sign using RSA, with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<SignatureBytes> {
    let sig = key.sign(sign_scheme(hash)?, digest)?;

    Ok(SignatureBytes::Rsa(Mpi::from_slice(&sig)))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_sign_verify_encrypt_decrypt() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let n = Mpi::from(key.n());
        let e = Mpi::from(key.e());

        let digest = HashAlgorithm::Sha256.digest(b"hello").unwrap();
        let sig = sign(&key, HashAlgorithm::Sha256, &digest).unwrap();
        let SignatureBytes::Rsa(sig) = sig else {
            panic!("expected rsa signature");
        };
        verify(&n, &e, HashAlgorithm::Sha256, &digest, &sig).unwrap();

        let other = HashAlgorithm::Sha256.digest(b"hellO").unwrap();
        assert!(verify(&n, &e, HashAlgorithm::Sha256, &other, &sig).is_err());

        let PkeskBytes::Rsa { mpi } = encrypt(&mut rng, &n, &e, b"session").unwrap() else {
            panic!("expected rsa ciphertext");
        };
        assert_eq!(&decrypt(&key, &mpi).unwrap()[..], b"session");
    }
}
