use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::errors::Result;
use crate::types::{Mpi, PkeskBytes};

/// Minimum number of random non-zero padding octets.
const MIN_PS_LEN: usize = 8;

/// EME-PKCS1-v1_5 encoding, <https://www.rfc-editor.org/rfc/rfc4880.html#section-13.1.1>
fn pad<R: CryptoRng + Rng>(rng: &mut R, k: usize, msg: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    ensure!(
        msg.len() + MIN_PS_LEN + 3 <= k,
        "message too long for a {} byte modulus",
        k
    );

    let ps_len = k - msg.len() - 3;
    let mut em = Zeroizing::new(vec![0u8; k]);
    em[1] = 0x02;
    for b in &mut em[2..2 + ps_len] {
        *b = rng.gen_range(1..=255);
    }
    em[k - msg.len()..].copy_from_slice(msg);

    Ok(em)
}

fn unpad(em: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    ensure!(
        em.len() > MIN_PS_LEN + 2 && em[0] == 0x00 && em[1] == 0x02,
        "elgamal: invalid padding"
    );

    let Some(sep) = em[2..].iter().position(|b| *b == 0) else {
        bail!("elgamal: invalid padding");
    };
    ensure!(sep >= MIN_PS_LEN, "elgamal: padding too short");

    Ok(Zeroizing::new(em[2 + sep + 1..].to_vec()))
}

/// ElGamal encryption of `plaintext` for the public key `(p, g, y)`.
pub fn encrypt<R: CryptoRng + Rng>(
    mut rng: R,
    p: &Mpi,
    g: &Mpi,
    y: &Mpi,
    plaintext: &[u8],
) -> Result<PkeskBytes> {
    let p_num = p.to_biguint();
    ensure!(p_num > BigUint::from(3u8), "elgamal: invalid prime");
    let g = g.to_biguint();
    let y = y.to_biguint();

    let em = pad(&mut rng, p.len(), plaintext)?;
    let m = BigUint::from_bytes_be(&em);

    // k in [1, p - 2]
    let k = rng.gen_biguint_range(&BigUint::one(), &(p_num.clone() - 1u32));

    let c1 = g.modpow(&k, &p_num);
    let c2 = (m * y.modpow(&k, &p_num)) % &p_num;

    Ok(PkeskBytes::Elgamal {
        first: c1.into(),
        second: c2.into(),
    })
}

/// ElGamal decryption with the secret exponent `x`.
pub fn decrypt(p: &Mpi, x: &Mpi, c1: &Mpi, c2: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
    let p_num = p.to_biguint();
    ensure!(p_num > BigUint::from(3u8), "elgamal: invalid prime");
    let c1 = c1.to_biguint();
    ensure!(!c1.is_zero(), "elgamal: invalid ciphertext");

    let s = c1.modpow(&x.to_biguint(), &p_num);
    // s^-1 = s^(p-2) mod p
    let s_inv = s.modpow(&(p_num.clone() - 2u32), &p_num);
    let m = (c2.to_biguint() * s_inv) % &p_num;

    let em = Mpi::from(m).to_padded(p.len())?;
    unpad(&em)
}

#[cfg(test)]
mod tests {
    use num_bigint::RandPrime;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p: BigUint = rng.gen_prime(512);
        let g = BigUint::from(2u8);
        let x = rng.gen_biguint_range(&BigUint::from(2u8), &(p.clone() - 2u32));
        let y = g.modpow(&x, &p);

        let (p, g, y, x) = (Mpi::from(p), Mpi::from(g), Mpi::from(y), Mpi::from(x));

        let msg = b"\x09session-key-bytes\x01\x02";
        let PkeskBytes::Elgamal { first, second } = encrypt(&mut rng, &p, &g, &y, msg).unwrap()
        else {
            panic!("expected elgamal ciphertext");
        };

        assert_eq!(&decrypt(&p, &x, &first, &second).unwrap()[..], &msg[..]);

        let wrong = Mpi::from(x.to_biguint() + 1u32);
        assert!(decrypt(&p, &wrong, &first, &second).is_err());
    }

    #[test]
    fn test_padding() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let em = pad(&mut rng, 32, b"abc").unwrap();
        assert_eq!(&em[..2], &[0, 2]);
        assert!(em[2..28].iter().all(|b| *b != 0));
        assert_eq!(&unpad(&em).unwrap()[..], b"abc");

        assert!(pad(&mut rng, 16, &[1u8; 6]).is_err());
        assert!(unpad(&[0, 2, 1, 1, 0, 5, 5, 5, 5, 5, 5, 5]).is_err());
    }
}
