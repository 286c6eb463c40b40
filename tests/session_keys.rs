#[macro_use]
extern crate pretty_assertions;

use chrono::{TimeZone, Utc};
use num_bigint::{BigUint, ModInverse, RandBigInt, RandPrime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;

use pgp_packet::crypto::hash::HashAlgorithm;
use pgp_packet::crypto::public_key::PublicKeyAlgorithm;
use pgp_packet::crypto::sym::SymmetricKeyAlgorithm;
use pgp_packet::errors::Error;
use pgp_packet::packet::{
    read_packet, LiteralData, Packet, PublicKey, PublicKeyEncryptedSessionKey, SecretKey,
    SymEncryptedData, SymKeyEncryptedSessionKey,
};
use pgp_packet::ser::Serialize;
use pgp_packet::types::{
    KeyVersion, Mpi, PacketHeaderVersion, Password, PkeskBytes, PlainSecretParams,
    PublicKeyTrait, PublicParams, SecretParams, SessionKey, StringToKey,
};

fn rsa_key(seed: u64) -> SecretKey {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
    let primes = key.primes();

    let public = PublicKey::new(
        PacketHeaderVersion::New,
        KeyVersion::V4,
        PublicKeyAlgorithm::RSA,
        Utc.timestamp_opt(1_100_000_000, 0).single().unwrap(),
        None,
        PublicParams::RSA {
            n: key.n().into(),
            e: key.e().into(),
        },
    )
    .unwrap();

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
fn pkesk_roundtrip() {
    let _ = pretty_env_logger::try_init();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let key = rsa_key(1);

    for alg in [
        SymmetricKeyAlgorithm::AES128,
        SymmetricKeyAlgorithm::AES256,
        SymmetricKeyAlgorithm::CAST5,
        SymmetricKeyAlgorithm::TripleDES,
    ] {
        let session_key = SessionKey::new(&mut rng, alg).unwrap();
        let pkesk = PublicKeyEncryptedSessionKey::from_session_key(
            &mut rng,
            PacketHeaderVersion::New,
            &session_key,
            key.public_key(),
        )
        .unwrap();
        assert_eq!(pkesk.id(), &key.key_id());
        assert_eq!(pkesk.algorithm(), PublicKeyAlgorithm::RSA);

        let bytes = Packet::from(pkesk.clone()).to_bytes().unwrap();
        let parsed: PublicKeyEncryptedSessionKey = read_packet(&mut &bytes[..])
            .unwrap()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(parsed, pkesk);

        let recovered = parsed.decrypt(&key, &Password::empty()).unwrap();
        assert_eq!(recovered, session_key);
    }
}

#[test]
fn pkesk_wrong_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let key = rsa_key(2);
    let other = rsa_key(3);

    let session_key = SessionKey::new(&mut rng, SymmetricKeyAlgorithm::AES128).unwrap();
    let pkesk = PublicKeyEncryptedSessionKey::from_session_key(
        &mut rng,
        PacketHeaderVersion::New,
        &session_key,
        key.public_key(),
    )
    .unwrap();

    assert!(pkesk.decrypt(&other, &Password::empty()).is_err());
}

#[test]
fn pkesk_with_protected_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let key = rsa_key(4);
    let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha1, 96);
    let locked = key
        .encrypt(&mut rng, &"pw".into(), SymmetricKeyAlgorithm::AES192, s2k)
        .unwrap();

    let session_key = SessionKey::new(&mut rng, SymmetricKeyAlgorithm::Twofish).unwrap();
    let pkesk = PublicKeyEncryptedSessionKey::from_session_key(
        &mut rng,
        PacketHeaderVersion::Old,
        &session_key,
        locked.public_key(),
    )
    .unwrap();

    assert_eq!(pkesk.decrypt(&locked, &"pw".into()).unwrap(), session_key);
    let err = pkesk.decrypt(&locked, &"nope".into()).unwrap_err();
    assert!(err.is_integrity_failure(), "{:?}", err);
}

/// Two ElGamal keys sharing the group `(p, g)`.
fn elgamal_keys(seed: u64) -> (SecretKey, SecretKey) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let p: BigUint = rng.gen_prime(1024);
    let g = BigUint::from(2u8);

    let mut key = || {
        let x = rng.gen_biguint_range(&BigUint::from(2u8), &(p.clone() - 2u32));
        let y = g.modpow(&x, &p);

        let public = PublicKey::new(
            PacketHeaderVersion::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::ElgamalEncrypt,
            Utc.timestamp_opt(1_100_000_000, 0).single().unwrap(),
            None,
            PublicParams::Elgamal {
                p: Mpi::from(&p),
                g: Mpi::from(&g),
                y: Mpi::from(y),
            },
        )
        .unwrap();

        SecretKey::new(
            public,
            SecretParams::Plain(PlainSecretParams::Elgamal { x: Mpi::from(x) }),
        )
    };

    let first = key();
    let second = key();
    (first, second)
}

#[test]
fn pkesk_elgamal_roundtrip() {
    let _ = pretty_env_logger::try_init();
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let (key, other) = elgamal_keys(8);

    for alg in [SymmetricKeyAlgorithm::AES256, SymmetricKeyAlgorithm::CAST5] {
        let session_key = SessionKey::new(&mut rng, alg).unwrap();
        let pkesk = PublicKeyEncryptedSessionKey::from_session_key(
            &mut rng,
            PacketHeaderVersion::New,
            &session_key,
            key.public_key(),
        )
        .unwrap();
        assert_eq!(pkesk.algorithm(), PublicKeyAlgorithm::ElgamalEncrypt);
        assert!(matches!(pkesk.values(), PkeskBytes::Elgamal { .. }));

        let bytes = Packet::from(pkesk.clone()).to_bytes().unwrap();
        let parsed: PublicKeyEncryptedSessionKey = read_packet(&mut &bytes[..])
            .unwrap()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(parsed, pkesk);

        assert_eq!(parsed.decrypt(&key, &Password::empty()).unwrap(), session_key);
        assert!(parsed.decrypt(&other, &Password::empty()).is_err());
    }
}

#[test]
fn skesk_wrapped_key() {
    let _ = pretty_env_logger::try_init();
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    let session_key = SessionKey::new(&mut rng, SymmetricKeyAlgorithm::AES256).unwrap();
    let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 96);
    let skesk = SymKeyEncryptedSessionKey::encrypt_v4(
        PacketHeaderVersion::New,
        &"secret".into(),
        s2k,
        SymmetricKeyAlgorithm::AES128,
        &session_key,
    )
    .unwrap();
    assert_eq!(
        skesk.encrypted_key().map(|k| k.len()),
        Some(1 + session_key.key.len())
    );

    let bytes = Packet::from(skesk.clone()).to_bytes().unwrap();
    let parsed: SymKeyEncryptedSessionKey = read_packet(&mut &bytes[..])
        .unwrap()
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(parsed, skesk);
    assert_eq!(parsed.decrypt(&"secret".into()).unwrap(), session_key);
}

#[test]
fn skesk_direct_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let s2k = StringToKey::new_salted(&mut rng, HashAlgorithm::Sha1);
    let skesk =
        SymKeyEncryptedSessionKey::direct(PacketHeaderVersion::Old, s2k, SymmetricKeyAlgorithm::CAST5);
    assert!(skesk.encrypted_key().is_none());

    let session_key = skesk.decrypt(&"direct".into()).unwrap();
    assert_eq!(session_key.sym_algorithm, SymmetricKeyAlgorithm::CAST5);
    assert_eq!(session_key.key.len(), 16);

    let lit = LiteralData::from_str(PacketHeaderVersion::New, "d.txt", "direct");
    let sed = SymEncryptedData::encrypt_packets(
        &mut rng,
        PacketHeaderVersion::New,
        &session_key,
        &[lit.clone().into()],
    )
    .unwrap();
    assert_eq!(sed.decrypt_packets(&session_key).unwrap(), vec![Packet::from(lit)]);

    // a different passphrase derives a different key, caught by the quick check
    let wrong = skesk.decrypt(&"indirect".into()).unwrap();
    let err = sed.decrypt_packets(&wrong).unwrap_err();
    assert!(matches!(err, Error::SessionKeyMismatch), "{:?}", err);
}

#[test]
fn session_key_length_is_checked() {
    assert!(SessionKey::from_parts(SymmetricKeyAlgorithm::AES128, &[0u8; 15]).is_err());
    assert!(SessionKey::from_parts(SymmetricKeyAlgorithm::Plaintext, &[]).is_err());

    let key = SessionKey::from_parts(SymmetricKeyAlgorithm::AES128, &[1u8; 16]).unwrap();
    assert_eq!(key.checksum(), 16);
}
