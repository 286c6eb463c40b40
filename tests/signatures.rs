#[macro_use]
extern crate pretty_assertions;

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hex_literal::hex;
use num_bigint::{BigUint, ModInverse};
use num_traits::Num;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;

use pgp_packet::crypto::hash::HashAlgorithm;
use pgp_packet::crypto::public_key::PublicKeyAlgorithm;
use pgp_packet::errors::Error;
use pgp_packet::packet::{
    read_packet, KeyFlags, Packet, PublicKey, PublicSubkey, RevocationCode, SecretKey,
    SecretSubkey, Signature, SignatureConfig, SignatureType, SignatureVersion, Subpacket,
    SubpacketArea, SubpacketData, UserId,
};
use pgp_packet::ser::Serialize;
use pgp_packet::types::{
    KeyId, KeyVersion, Mpi, PacketHeaderVersion, Password, PlainSecretParams, PublicKeyTrait,
    PublicParams, SecretParams, SignatureBytes, Tag,
};

fn created() -> DateTime<Utc> {
    Utc.timestamp_opt(1_300_000_000, 0).single().unwrap()
}

fn rsa_key(seed: u64, version: KeyVersion) -> SecretKey {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
    let primes = key.primes();

    let public = PublicKey::new(
        PacketHeaderVersion::Old,
        version,
        PublicKeyAlgorithm::RSA,
        created(),
        version.is_legacy().then_some(0),
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

fn hex_mpi(s: &str) -> Mpi {
    Mpi::from(BigUint::from_str_radix(s, 16).unwrap())
}

/// The DSA key from RFC 6979, appendix A.2.1.
fn dsa_key() -> SecretKey {
    let public = PublicKey::new(
        PacketHeaderVersion::New,
        KeyVersion::V4,
        PublicKeyAlgorithm::DSA,
        created(),
        None,
        PublicParams::DSA {
            p: hex_mpi(
                "86F5CA03DCFEB225063FF830A0C769B9DD9D6153AD91D7CE27F787C43278B447\
                 E6533B86B18BED6E8A48B784A14C252C5BE0DBF60B86D6385BD2F12FB763ED88\
                 73ABFD3F5BA2E0A8C0A59082EAC056935E529DAF7C610467899C77ADEDFC846C\
                 881870B7B19B2B58F9BE0521A17002E3BDD6B86685EE90B3D9A1B02B782B1779",
            ),
            q: hex_mpi("996F967F6C8E388D9E28D01E205FBA957A5698B1"),
            g: hex_mpi(
                "07B0F92546150B62514BB771E2A0C0CE387F03BDA6C56B505209FF25FD3C133D\
                 89BBCD97E904E09114D9A7DEFDEADFC9078EA544D2E401AEECC40BB9FBBF78FD\
                 87995A10A1C27CB7789B594BA7EFB5C4326A9FE59A070E136DB77175464ADCA4\
                 17BE5DCE2F40D10A46A3A3943F26AB7FD9C0398FF8C76EE0A56826A8A88F1DBD",
            ),
            y: hex_mpi(
                "5DF5E01DED31D0297E274E1691C192FE5868FEF9E19A84776454B100CF16F653\
                 92195A38B90523E2542EE61871C0440CB87C322FC4B4D2EC5E1E7EC766E1BE8D\
                 4CE935437DC11C3C8FD426338933EBFE739CB3465F4D3668C5E473508253B1E6\
                 82F65CBDC4FAE93C2EA212390E54905A86E2223170B44EAA7DA5DD9FFCFB7F3B",
            ),
        },
    )
    .unwrap();

    SecretKey::new(
        public,
        SecretParams::Plain(PlainSecretParams::DSA {
            x: hex_mpi("411602CB19A6CCC34494D79D98EF1E7ED5AF25F7"),
        }),
    )
}

fn v4_config(typ: SignatureType, key: &impl PublicKeyTrait) -> SignatureConfig {
    SignatureConfig::v4(
        typ,
        key.algorithm(),
        HashAlgorithm::Sha256,
        vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(created())),
            Subpacket::regular(SubpacketData::Issuer(key.key_id())),
        ],
        vec![],
    )
}

/// Writes the signature as a packet and reads it back.
fn reread(sig: &Signature) -> Signature {
    let bytes = Packet::from(sig.clone()).to_bytes().unwrap();
    let packet = read_packet(&mut &bytes[..]).unwrap().unwrap();
    assert_eq!(packet.to_bytes().unwrap(), bytes);
    packet.try_into().unwrap()
}

#[test]
fn subpacket_tolerance() {
    let _ = pretty_env_logger::try_init();

    let body = hex!(
        "04 00 01 08"
        // hashed area: creation time, then unknown type 100
        "00 0a" "05 02 4d 7c 6d 00" "03 64 aa bb"
        // unhashed area: issuer
        "00 0a" "09 10 01 02 03 04 05 06 07 08"
        "ab cd"
        "00 08 ff"
    );
    let mut input = vec![0xC2, body.len() as u8];
    input.extend_from_slice(&body);

    let sig: Signature = read_packet(&mut &input[..])
        .unwrap()
        .unwrap()
        .try_into()
        .unwrap();

    assert_eq!(sig.version(), SignatureVersion::V4);
    assert_eq!(sig.config.hashed_subpackets.len(), 1);
    assert_eq!(
        sig.config.hashed_subpackets.packets()[0].data,
        SubpacketData::SignatureCreationTime(Utc.timestamp_opt(0x4d7c6d00, 0).single().unwrap())
    );
    assert!(sig.config.hashed_subpackets.skipped_critical().is_empty());
    assert_eq!(sig.issuer(), Some(&KeyId::from(hex!("0102030405060708"))));

    // the dropped subpacket is still written
    assert_eq!(Packet::from(sig).to_bytes().unwrap(), input);
}

#[test]
fn binary_signature() {
    let _ = pretty_env_logger::try_init();
    let key = rsa_key(1, KeyVersion::V4);
    let data = b"hello world";

    let sig = v4_config(SignatureType::Binary, &key)
        .sign(&key, &Password::empty(), data)
        .unwrap();
    assert_eq!(sig.created(), Some(&created()));
    assert_eq!(sig.issuer_key_id().unwrap(), key.key_id());

    let sig = reread(&sig);
    sig.verify(key.public_key(), data).unwrap();
    assert!(sig.verify(key.public_key(), b"hello world!").is_err());

    let other = rsa_key(2, KeyVersion::V4);
    assert!(sig.verify(other.public_key(), data).is_err());
}

#[test]
fn text_signature_normalizes_line_endings() {
    let key = rsa_key(3, KeyVersion::V4);

    let sig = v4_config(SignatureType::Text, &key)
        .sign(&key, &Password::empty(), b"line one\nline two\n")
        .unwrap();

    sig.verify(key.public_key(), b"line one\r\nline two\r\n").unwrap();
    sig.verify(key.public_key(), b"line one\nline two\n").unwrap();
    assert!(sig.verify(key.public_key(), b"line one line two\n").is_err());
}

#[test]
fn v3_signature() {
    let key = rsa_key(4, KeyVersion::V3);
    let config = SignatureConfig::v3(
        SignatureType::Binary,
        PublicKeyAlgorithm::RSA,
        HashAlgorithm::Sha1,
        created(),
        key.key_id(),
    );

    let sig = config.sign(&key, &Password::empty(), b"v3 data").unwrap();
    let sig = reread(&sig);
    assert_eq!(sig.version(), SignatureVersion::V3);
    assert_eq!(sig.created(), Some(&created()));

    sig.verify(key.public_key(), b"v3 data").unwrap();
    assert!(sig.verify(key.public_key(), b"v3 date").is_err());
}

#[test]
fn dsa_signature() {
    let key = dsa_key();

    for hash in [HashAlgorithm::Sha1, HashAlgorithm::Sha256] {
        let mut config = v4_config(SignatureType::Binary, &key);
        config.hash_alg = hash;
        let sig = config
            .sign(&key, &Password::empty(), b"sample")
            .unwrap();
        assert!(matches!(sig.signature, SignatureBytes::Dsa { .. }));

        let sig = reread(&sig);
        sig.verify(key.public_key(), b"sample").unwrap();
        assert!(sig.verify(key.public_key(), b"test").is_err());
    }
}

#[test]
fn user_id_certification() {
    let key = rsa_key(5, KeyVersion::V4);
    let id = UserId::from_str(PacketHeaderVersion::New, "Alice <alice@example.com>");

    let mut config = v4_config(SignatureType::CertPositive, &key);
    config.hashed_subpackets.push(Subpacket::regular(SubpacketData::KeyFlags({
        let mut flags = KeyFlags::from_bits(0);
        flags.set_certify(true);
        flags.set_sign(true);
        flags.into()
    })));
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::IsPrimary(true)));

    let sig = config
        .sign_certification(&key, &Password::empty(), Tag::UserId, &id)
        .unwrap();
    let sig = reread(&sig);

    assert!(sig.is_certification());
    assert!(sig.is_primary());
    assert!(sig.key_flags().certify());
    assert!(sig.key_flags().sign());
    assert!(!sig.key_flags().encrypt_comms());

    sig.verify_certification(key.public_key(), Tag::UserId, &id)
        .unwrap();

    let other = UserId::from_str(PacketHeaderVersion::New, "Mallory <m@example.com>");
    assert!(sig
        .verify_certification(key.public_key(), Tag::UserId, &other)
        .is_err());

    // only certification types can certify
    assert!(v4_config(SignatureType::Binary, &key)
        .sign_certification(&key, &Password::empty(), Tag::UserId, &id)
        .is_err());
}

#[test]
fn v3_certification() {
    let key = rsa_key(6, KeyVersion::V3);
    let id = UserId::from_str(PacketHeaderVersion::Old, "Bob <bob@example.com>");

    let sig = SignatureConfig::v3(
        SignatureType::CertGeneric,
        PublicKeyAlgorithm::RSA,
        HashAlgorithm::Md5,
        created(),
        key.key_id(),
    )
    .sign_certification(&key, &Password::empty(), Tag::UserId, &id)
    .unwrap();

    reread(&sig)
        .verify_certification(key.public_key(), Tag::UserId, &id)
        .unwrap();
}

#[test]
fn third_party_certification() {
    let signee = rsa_key(7, KeyVersion::V4);
    let signer = rsa_key(8, KeyVersion::V4);
    let id = UserId::from_str(PacketHeaderVersion::New, "Carol <carol@example.com>");

    let sig = v4_config(SignatureType::CertCasual, &signer)
        .sign_third_party_certification(
            &signer,
            &Password::empty(),
            signee.public_key(),
            Tag::UserId,
            &id,
        )
        .unwrap();
    let sig = reread(&sig);
    assert_eq!(sig.issuer(), Some(&signer.key_id()));

    sig.verify_third_party_certification(signee.public_key(), signer.public_key(), Tag::UserId, &id)
        .unwrap();
    // not a self certification
    assert!(sig
        .verify_certification(signer.public_key(), Tag::UserId, &id)
        .is_err());
    // the issuer does not match the signee
    assert!(sig
        .verify_third_party_certification(signee.public_key(), signee.public_key(), Tag::UserId, &id)
        .is_err());
}

#[test]
fn subkey_binding() {
    let primary = rsa_key(9, KeyVersion::V4);
    let sub = rsa_key(10, KeyVersion::V4);
    let sub = SecretSubkey::new(
        PublicSubkey::new(
            PacketHeaderVersion::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            created(),
            None,
            sub.public_params().clone(),
        )
        .unwrap(),
        sub.secret_params().clone(),
    );

    // primary key binding made by the subkey, embedded into the binding
    let back_sig = v4_config(SignatureType::KeyBinding, &sub)
        .sign_key_binding(&sub, &Password::empty(), primary.public_key())
        .unwrap();

    let mut config = v4_config(SignatureType::SubkeyBinding, &primary);
    config
        .unhashed_subpackets
        .push(Subpacket::regular(SubpacketData::EmbeddedSignature(Box::new(
            back_sig,
        ))));

    let sig = config
        .sign_key_binding(&primary, &Password::empty(), sub.public_key())
        .unwrap();
    let sig = reread(&sig);

    sig.verify_key_binding(primary.public_key(), sub.public_key())
        .unwrap();
    // order matters
    assert!(sig
        .verify_key_binding(sub.public_key(), primary.public_key())
        .is_err());

    let embedded = sig.embedded_signature().unwrap();
    embedded
        .verify_key_binding(sub.public_key(), primary.public_key())
        .unwrap();
}

#[test]
fn key_revocation() {
    let key = rsa_key(11, KeyVersion::V4);

    let mut config = v4_config(SignatureType::KeyRevocation, &key);
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::RevocationReason(
            RevocationCode::KeyCompromised,
            Bytes::from_static(b"lost laptop"),
        )));
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::KeyExpirationTime(
            Duration::days(30),
        )));

    let sig = config
        .sign_key(&key, &Password::empty(), key.public_key())
        .unwrap();
    let sig = reread(&sig);

    assert_eq!(sig.revocation_reason_code(), Some(&RevocationCode::KeyCompromised));
    assert_eq!(
        sig.revocation_reason_string().map(|r| &r[..]),
        Some(&b"lost laptop"[..])
    );
    assert_eq!(sig.key_expiration_time(), Some(&Duration::days(30)));
    sig.verify_key(key.public_key()).unwrap();
}

#[test]
fn unknown_critical_subpacket_fails_verification() {
    let _ = pretty_env_logger::try_init();
    let key = rsa_key(12, KeyVersion::V4);
    let issuer = SubpacketArea::new(vec![Subpacket::regular(SubpacketData::Issuer(
        key.key_id(),
    ))]);

    // creation time, then type 100 with and without the critical bit
    for (raw, critical) in [
        (&hex!("05 02 4d 7c 6d 00 03 e4 aa bb")[..], true),
        (&hex!("05 02 4d 7c 6d 00 03 64 aa bb")[..], false),
    ] {
        let hashed = SubpacketArea::from_raw(Bytes::copy_from_slice(raw)).unwrap();
        assert_eq!(hashed.len(), 1);

        let config = SignatureConfig::v4(
            SignatureType::Binary,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha256,
            hashed,
            issuer.clone(),
        );
        let sig = config.sign(&key, &Password::empty(), b"data").unwrap();
        let sig = reread(&sig);

        let res = sig.verify(key.public_key(), b"data");
        if critical {
            assert_eq!(sig.config.hashed_subpackets.skipped_critical(), &[100]);
            assert!(
                matches!(res, Err(Error::UnknownCriticalSubpacket { typ: 100 })),
                "{:?}",
                res
            );
        } else {
            res.unwrap();
        }
    }
}

#[test]
fn missing_issuer() {
    let key = rsa_key(13, KeyVersion::V4);
    let config = SignatureConfig::v4(
        SignatureType::Binary,
        PublicKeyAlgorithm::RSA,
        HashAlgorithm::Sha512,
        vec![Subpacket::regular(SubpacketData::SignatureCreationTime(
            created(),
        ))],
        vec![],
    );

    let sig = reread(&config.sign(&key, &Password::empty(), b"anon").unwrap());
    assert!(sig.issuer().is_none());
    assert!(matches!(sig.issuer_key_id(), Err(Error::MissingIssuer)));

    // the issuer is optional for verification
    sig.verify(key.public_key(), b"anon").unwrap();
}

#[test]
fn signing_key_must_match_algorithm() {
    let key = rsa_key(14, KeyVersion::V4);
    let config = SignatureConfig::v4(
        SignatureType::Binary,
        PublicKeyAlgorithm::DSA,
        HashAlgorithm::Sha256,
        vec![],
        vec![],
    );

    assert!(config.sign(&key, &Password::empty(), b"x").is_err());
}
