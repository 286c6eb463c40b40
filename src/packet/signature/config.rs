use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use digest::DynDigest;
use log::debug;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::normalize_lines::normalize_crlf;
use crate::packet::signature::{
    Signature, SignatureType, SignatureVersion, SignatureVersionSpecific, Subpacket,
    SubpacketArea,
};
use crate::ser::{time_to_u32, Serialize};
use crate::types::{KeyId, PacketHeaderVersion, Password, PublicKeyTrait, SecretKeyTrait, Tag};

/// Everything about a signature except the signature value itself.
///
/// Build one, then call one of the `sign*` methods to produce a [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "Error"))]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,

    #[builder(default = "HashAlgorithm::Sha256")]
    pub hash_alg: HashAlgorithm,

    #[builder(default, setter(into))]
    pub hashed_subpackets: SubpacketArea,
    #[builder(default, setter(into))]
    pub unhashed_subpackets: SubpacketArea,

    #[builder(default)]
    pub version_specific: SignatureVersionSpecific,
}

impl SignatureConfig {
    /// A V2/V3 style configuration, creation time and issuer are stored inline.
    pub fn v3(
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        created: DateTime<Utc>,
        issuer: KeyId,
    ) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: SubpacketArea::default(),
            unhashed_subpackets: SubpacketArea::default(),
            version_specific: SignatureVersionSpecific::V3 { created, issuer },
        }
    }

    pub fn v4(
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        hashed_subpackets: impl Into<SubpacketArea>,
        unhashed_subpackets: impl Into<SubpacketArea>,
    ) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: hashed_subpackets.into(),
            unhashed_subpackets: unhashed_subpackets.into(),
            version_specific: SignatureVersionSpecific::V4,
        }
    }

    /// Sign the given data.
    pub fn sign(
        self,
        key: &impl SecretKeyTrait,
        key_pw: &Password,
        data: &[u8],
    ) -> Result<Signature> {
        let mut hasher = self.hash_alg.new_hasher()?;
        self.hash_data_to_sign(&mut *hasher, data)?;

        self.finish_sign(key, key_pw, hasher)
    }

    /// Create a certification signature over `key` and the user id `id`.
    pub fn sign_certification(
        self,
        key: &impl SecretKeyTrait,
        key_pw: &Password,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<Signature> {
        ensure!(
            self.is_certification(),
            "can not sign non certification as certification"
        );
        debug!("signing certification {:?}", self.typ);

        let mut hasher = self.hash_alg.new_hasher()?;
        self.hash_certification(&mut *hasher, key, tag, id)?;

        self.finish_sign(key, key_pw, hasher)
    }

    /// Certify the user id `id` on `signee` with `signer`.
    pub fn sign_third_party_certification(
        self,
        signer: &impl SecretKeyTrait,
        signer_pw: &Password,
        signee: &impl PublicKeyTrait,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<Signature> {
        ensure!(
            self.is_certification(),
            "can not sign non certification as certification"
        );
        debug!(
            "signing certification {:?} of {} by {}",
            self.typ,
            signee.key_id(),
            signer.key_id()
        );

        let mut hasher = self.hash_alg.new_hasher()?;
        self.hash_certification(&mut *hasher, signee, tag, id)?;

        self.finish_sign(signer, signer_pw, hasher)
    }

    /// Sign a key binding, binding `key` as a subkey of `signing_key`.
    pub fn sign_key_binding(
        self,
        signing_key: &impl SecretKeyTrait,
        key_pw: &Password,
        key: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        debug!(
            "signing key binding: {} - {}",
            signing_key.key_id(),
            key.key_id()
        );

        let mut hasher = self.hash_alg.new_hasher()?;
        // Signing Key
        self.hash_key(&mut *hasher, signing_key)?;
        // Key being bound
        self.hash_key(&mut *hasher, key)?;

        self.finish_sign(signing_key, key_pw, hasher)
    }

    /// Signs a direct key signature or a revocation.
    pub fn sign_key(
        self,
        signing_key: &impl SecretKeyTrait,
        key_pw: &Password,
        key: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        debug!("signing key (revocation): {:?} - {}", self.typ, key.key_id());

        let mut hasher = self.hash_alg.new_hasher()?;
        self.hash_key(&mut *hasher, key)?;

        self.finish_sign(signing_key, key_pw, hasher)
    }

    fn finish_sign(
        self,
        key: &impl SecretKeyTrait,
        key_pw: &Password,
        mut hasher: Box<dyn DynDigest>,
    ) -> Result<Signature> {
        ensure_eq!(
            key.algorithm(),
            self.pub_alg,
            "signing key does not match the signature algorithm"
        );

        let len = self.hash_signature_data(&mut *hasher)?;
        hasher.update(&self.trailer(len)?);

        let hash = &hasher.finalize()[..];
        let signed_hash_value = [hash[0], hash[1]];
        let signature = key.create_signature(key_pw, self.hash_alg, hash)?;

        Ok(Signature::from_config(
            PacketHeaderVersion::default(),
            self,
            signed_hash_value,
            signature,
        ))
    }

    /// Returns what kind of signature this is.
    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    pub fn version(&self) -> SignatureVersion {
        SignatureVersion::from(&self.version_specific)
    }

    pub fn hashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets.iter()
    }

    pub fn unhashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.unhashed_subpackets.iter()
    }

    /// Returns if the signature is a certification or not.
    pub fn is_certification(&self) -> bool {
        matches!(
            self.typ,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
                | SignatureType::CertRevocation
        )
    }

    /// Hashes the document covered by a binary, text or standalone signature.
    pub fn hash_data_to_sign(&self, hasher: &mut dyn DynDigest, data: &[u8]) -> Result<usize> {
        match self.typ {
            SignatureType::Binary => {
                hasher.update(data);
                Ok(data.len())
            }
            SignatureType::Text => {
                let normalized = normalize_crlf(data);
                hasher.update(&normalized);
                Ok(normalized.len())
            }
            SignatureType::Timestamp | SignatureType::Standalone => {
                if !data.is_empty() {
                    debug!("ignoring {} bytes of data for {:?}", data.len(), self.typ);
                }
                Ok(0)
            }
            typ => bail!("{:?} signatures are not made over data", typ),
        }
    }

    /// Hashes a key the way certifications and bindings cover it.
    pub(crate) fn hash_key(&self, hasher: &mut dyn DynDigest, key: &impl PublicKeyTrait) -> Result<()> {
        let mut key_buf = Vec::new();
        key.serialize_for_hashing(&mut key_buf)?;
        hasher.update(&key_buf);

        Ok(())
    }

    /// Hashes `key` followed by the user id. V4 signatures prefix the id with
    /// `0xB4` and its length.
    pub(crate) fn hash_certification(
        &self,
        hasher: &mut dyn DynDigest,
        key: &impl PublicKeyTrait,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<()> {
        self.hash_key(hasher, key)?;

        let packet_buf = id.to_bytes()?;
        match self.version() {
            SignatureVersion::V2 | SignatureVersion::V3 => {
                // Nothing to do
            }
            SignatureVersion::V4 => {
                let prefix = match tag {
                    Tag::UserId => 0xB4,
                    _ => bail!("invalid tag for certification: {:?}", tag),
                };

                let mut prefix_buf = [prefix, 0u8, 0u8, 0u8, 0u8];
                BigEndian::write_u32(&mut prefix_buf[1..], packet_buf.len().try_into()?);
                hasher.update(&prefix_buf);
            }
            SignatureVersion::Other(v) => unsupported_err!("signature version {}", v),
        }
        hasher.update(&packet_buf);

        Ok(())
    }

    /// Hashes the signature fields covered by the signature itself, returning
    /// the number of bytes that make up the V4 trailer length.
    pub fn hash_signature_data(&self, hasher: &mut dyn DynDigest) -> Result<usize> {
        match &self.version_specific {
            SignatureVersionSpecific::V2 { created, .. }
            | SignatureVersionSpecific::V3 { created, .. } => {
                let mut buf = [0u8; 5];
                buf[0] = self.typ.into();
                BigEndian::write_u32(&mut buf[1..], time_to_u32(created));

                hasher.update(&buf);

                // no trailer
                Ok(0)
            }
            SignatureVersionSpecific::V4 => {
                let mut res: Vec<u8> = vec![
                    // version
                    SignatureVersion::V4.into(),
                    // type
                    self.typ.into(),
                    // public algorithm
                    self.pub_alg.into(),
                    // hash algorithm
                    self.hash_alg.into(),
                ];

                // two octet length and the hashed subpackets
                self.hashed_subpackets.to_writer(&mut res)?;

                hasher.update(&res);

                Ok(res.len())
            }
        }
    }

    /// The final bytes hashed: `0x04 0xFF` and the length of the hashed
    /// signature data for V4, nothing for V2 and V3.
    pub fn trailer(&self, len: usize) -> Result<Vec<u8>> {
        match self.version_specific {
            SignatureVersionSpecific::V2 { .. } | SignatureVersionSpecific::V3 { .. } => {
                Ok(Vec::new())
            }
            SignatureVersionSpecific::V4 => {
                let mut trailer = vec![0x04, 0xFF, 0, 0, 0, 0];
                BigEndian::write_u32(&mut trailer[2..], len.try_into()?);
                Ok(trailer)
            }
        }
    }
}
