use bitfields::bitfield;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use digest::DynDigest;
use log::{debug, warn};
use num_enum::{FromPrimitive, IntoPrimitive};
use smallvec::{smallvec, SmallVec};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::{SignatureConfig, SubpacketArea, SubpacketData};
use crate::packet::{PacketHeader, PacketTrait};
use crate::ser::Serialize;
use crate::types::{
    CompressionAlgorithm, KeyId, PacketHeaderVersion, PublicKeyTrait, RevocationKey,
    SignatureBytes, Tag,
};

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Signature {
    packet_header: PacketHeader,

    pub config: SignatureConfig,
    #[debug("{}", hex::encode(signed_hash_value))]
    pub signed_hash_value: [u8; 2],
    pub signature: SignatureBytes,
}

impl Signature {
    /// Constructor for an OpenPGP v3 signature packet.
    #[allow(clippy::too_many_arguments)]
    pub fn v3(
        packet_version: PacketHeaderVersion,
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        created: DateTime<Utc>,
        issuer: KeyId,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
    ) -> Self {
        Self::from_config(
            packet_version,
            SignatureConfig::v3(typ, pub_alg, hash_alg, created, issuer),
            signed_hash_value,
            signature,
        )
    }

    /// Constructor for an OpenPGP v4 signature packet.
    #[allow(clippy::too_many_arguments)]
    pub fn v4(
        packet_version: PacketHeaderVersion,
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
        hashed_subpackets: SubpacketArea,
        unhashed_subpackets: SubpacketArea,
    ) -> Self {
        Self::from_config(
            packet_version,
            SignatureConfig::v4(
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
            ),
            signed_hash_value,
            signature,
        )
    }

    pub fn from_config(
        packet_version: PacketHeaderVersion,
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
    ) -> Self {
        let mut sig = Signature {
            packet_header: PacketHeader::new_fixed(Tag::Signature, 0),
            config,
            signed_hash_value,
            signature,
        };
        sig.packet_header =
            PacketHeader::new_for_body(packet_version, Tag::Signature, sig.write_len());

        sig
    }

    pub(super) fn with_header(
        packet_header: PacketHeader,
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
    ) -> Self {
        Signature {
            packet_header,
            config,
            signed_hash_value,
            signature,
        }
    }

    /// Returns what kind of signature this is.
    pub fn typ(&self) -> SignatureType {
        self.config.typ()
    }

    pub fn version(&self) -> SignatureVersion {
        self.config.version()
    }

    pub fn pub_alg(&self) -> PublicKeyAlgorithm {
        self.config.pub_alg
    }

    /// Returns the used hash algorithm.
    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    /// Fails if an unknown critical subpacket was dropped while decoding.
    fn check_critical(&self) -> Result<()> {
        let skipped = self
            .config
            .hashed_subpackets
            .skipped_critical()
            .iter()
            .chain(self.config.unhashed_subpackets.skipped_critical())
            .next();

        match skipped {
            Some(typ) => Err(Error::UnknownCriticalSubpacket { typ: *typ }),
            None => Ok(()),
        }
    }

    /// A signature without issuer matches any key.
    fn check_issuer(&self, key: &impl PublicKeyTrait) -> Result<()> {
        if let Some(issuer) = self.issuer() {
            ensure!(
                issuer == &key.key_id(),
                "signature issued by {}, not by {}",
                issuer,
                key.key_id()
            );
        }
        Ok(())
    }

    fn finish_verify(
        &self,
        key: &impl PublicKeyTrait,
        mut hasher: Box<dyn DynDigest>,
    ) -> Result<()> {
        let len = self.config.hash_signature_data(&mut *hasher)?;
        hasher.update(&self.config.trailer(len)?);

        let hash = hasher.finalize();
        if hash[..2] != self.signed_hash_value {
            warn!(
                "signed hash value mismatch: expected {}, got {}",
                hex::encode(self.signed_hash_value),
                hex::encode(&hash[..2])
            );
        }

        key.verify_signature(self.config.hash_alg, &hash, &self.signature)
    }

    /// Verify this signature over a document.
    ///
    /// Text signatures are computed over the data with CRLF line endings.
    pub fn verify(&self, key: &impl PublicKeyTrait, data: &[u8]) -> Result<()> {
        self.check_critical()?;
        self.check_issuer(key)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;
        self.config.hash_data_to_sign(&mut *hasher, data)?;

        self.finish_verify(key, hasher)
    }

    /// Verifies a certification of the user id `id` on `key`, made by `key`.
    pub fn verify_certification(
        &self,
        key: &impl PublicKeyTrait,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<()> {
        self.verify_third_party_certification(key, key, tag, id)
    }

    /// Verifies a certification of the user id `id` on `signee`, made by `signer`.
    pub fn verify_third_party_certification(
        &self,
        signee: &impl PublicKeyTrait,
        signer: &impl PublicKeyTrait,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<()> {
        debug!("verifying certification of {} by {}", signee.key_id(), signer.key_id());
        self.check_critical()?;
        self.check_issuer(signer)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;
        self.config.hash_certification(&mut *hasher, signee, tag, id)?;

        self.finish_verify(signer, hasher)
    }

    /// Verifies a subkey binding, the primary key `signer` is hashed first.
    pub fn verify_key_binding(
        &self,
        signer: &impl PublicKeyTrait,
        key: &impl PublicKeyTrait,
    ) -> Result<()> {
        debug!("verifying key binding {} - {}", signer.key_id(), key.key_id());
        self.check_critical()?;
        self.check_issuer(signer)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;
        self.config.hash_key(&mut *hasher, signer)?;
        self.config.hash_key(&mut *hasher, key)?;

        self.finish_verify(signer, hasher)
    }

    /// Verifies a direct key signature or a revocation.
    pub fn verify_key(&self, key: &impl PublicKeyTrait) -> Result<()> {
        debug!("verifying key signature {:?} on {}", self.typ(), key.key_id());
        self.check_critical()?;
        self.check_issuer(key)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;
        self.config.hash_key(&mut *hasher, key)?;

        self.finish_verify(key, hasher)
    }

    /// Returns if the signature is a certification or not.
    pub fn is_certification(&self) -> bool {
        self.config.is_certification()
    }

    /// The creation time, inline for V3, a hashed subpacket for V4.
    pub fn created(&self) -> Option<&DateTime<Utc>> {
        if let SignatureVersionSpecific::V2 { created, .. }
        | SignatureVersionSpecific::V3 { created, .. } = &self.config.version_specific
        {
            return Some(created);
        }

        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::SignatureCreationTime(d) => Some(d),
            _ => None,
        })
    }

    /// The key id of the issuer.
    ///
    /// V4 signatures are searched in the hashed area first, then in the
    /// unhashed one. The issuer subpacket is optional, so this may be `None`.
    pub fn issuer(&self) -> Option<&KeyId> {
        if let SignatureVersionSpecific::V2 { issuer, .. }
        | SignatureVersionSpecific::V3 { issuer, .. } = &self.config.version_specific
        {
            return Some(issuer);
        }

        self.config
            .hashed_subpackets()
            .chain(self.config.unhashed_subpackets())
            .find_map(|p| match &p.data {
                SubpacketData::Issuer(id) => Some(id),
                _ => None,
            })
    }

    /// Like [`Signature::issuer`], but a missing issuer is an error.
    pub fn issuer_key_id(&self) -> Result<KeyId> {
        self.issuer().copied().ok_or(Error::MissingIssuer)
    }

    /// First match of `f` in the hashed area.
    fn find_hashed<'a, T: 'a>(
        &'a self,
        f: impl FnMut(&'a SubpacketData) -> Option<T>,
    ) -> Option<T> {
        self.config.hashed_subpackets().map(|p| &p.data).find_map(f)
    }

    pub fn key_expiration_time(&self) -> Option<&Duration> {
        self.find_hashed(|d| match d {
            SubpacketData::KeyExpirationTime(d) => Some(d),
            _ => None,
        })
    }

    pub fn signature_expiration_time(&self) -> Option<&Duration> {
        self.find_hashed(|d| match d {
            SubpacketData::SignatureExpirationTime(d) => Some(d),
            _ => None,
        })
    }

    /// `created + expiration`, if the signature expires at all.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let expiration = self.signature_expiration_time()?;
        if expiration.num_seconds() == 0 {
            return None;
        }
        self.created()?.checked_add_signed(*expiration)
    }

    pub fn preferred_symmetric_algs(&self) -> &[SymmetricKeyAlgorithm] {
        self.find_hashed(|d| match d {
            SubpacketData::PreferredSymmetricAlgorithms(algs) => Some(&algs[..]),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn preferred_hash_algs(&self) -> &[HashAlgorithm] {
        self.find_hashed(|d| match d {
            SubpacketData::PreferredHashAlgorithms(algs) => Some(&algs[..]),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn preferred_compression_algs(&self) -> &[CompressionAlgorithm] {
        self.find_hashed(|d| match d {
            SubpacketData::PreferredCompressionAlgorithms(algs) => Some(&algs[..]),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn key_server_prefs(&self) -> &[u8] {
        self.find_hashed(|d| match d {
            SubpacketData::KeyServerPreferences(prefs) => Some(&prefs[..]),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// Key flags, all unset when the subpacket is missing.
    pub fn key_flags(&self) -> KeyFlags {
        self.find_hashed(|d| match d {
            SubpacketData::KeyFlags(raw) => Some(KeyFlags::from(&raw[..])),
            _ => None,
        })
        .unwrap_or_else(|| KeyFlags::from_bits(0))
    }

    pub fn features(&self) -> &[u8] {
        self.find_hashed(|d| match d {
            SubpacketData::Features(raw) => Some(&raw[..]),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn revocation_reason_code(&self) -> Option<&RevocationCode> {
        self.find_hashed(|d| match d {
            SubpacketData::RevocationReason(code, _) => Some(code),
            _ => None,
        })
    }

    pub fn revocation_reason_string(&self) -> Option<&Bytes> {
        self.find_hashed(|d| match d {
            SubpacketData::RevocationReason(_, reason) => Some(reason),
            _ => None,
        })
    }

    pub fn is_primary(&self) -> bool {
        self.find_hashed(|d| match d {
            SubpacketData::IsPrimary(v) => Some(*v),
            _ => None,
        })
        .unwrap_or(false)
    }

    /// Signatures are revocable unless a subpacket says otherwise.
    pub fn is_revocable(&self) -> bool {
        self.find_hashed(|d| match d {
            SubpacketData::Revocable(v) => Some(*v),
            _ => None,
        })
        .unwrap_or(true)
    }

    /// Looked up in both areas.
    pub fn embedded_signature(&self) -> Option<&Signature> {
        self.config
            .hashed_subpackets()
            .chain(self.config.unhashed_subpackets())
            .find_map(|p| match &p.data {
                SubpacketData::EmbeddedSignature(sig) => Some(&**sig),
                _ => None,
            })
    }

    pub fn preferred_key_server(&self) -> Option<&str> {
        self.find_hashed(|d| match d {
            SubpacketData::PreferredKeyServer(server) => Some(server.as_str()),
            _ => None,
        })
    }

    pub fn notations(&self) -> Vec<&Notation> {
        self.config
            .hashed_subpackets()
            .filter_map(|p| match &p.data {
                SubpacketData::Notation(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn revocation_key(&self) -> Option<&RevocationKey> {
        self.find_hashed(|d| match d {
            SubpacketData::RevocationKey(key) => Some(key),
            _ => None,
        })
    }

    pub fn signers_userid(&self) -> Option<&Bytes> {
        self.find_hashed(|d| match d {
            SubpacketData::SignersUserID(id) => Some(id),
            _ => None,
        })
    }

    pub fn policy_uri(&self) -> Option<&str> {
        self.find_hashed(|d| match d {
            SubpacketData::PolicyURI(uri) => Some(uri.as_str()),
            _ => None,
        })
    }

    /// `(depth, amount)`
    pub fn trust_signature(&self) -> Option<(u8, u8)> {
        self.find_hashed(|d| match d {
            SubpacketData::TrustSignature(depth, amount) => Some((*depth, *amount)),
            _ => None,
        })
    }

    pub fn regular_expression(&self) -> Option<&Bytes> {
        self.find_hashed(|d| match d {
            SubpacketData::RegularExpression(re) => Some(re),
            _ => None,
        })
    }

    pub fn exportable_certification(&self) -> bool {
        self.find_hashed(|d| match d {
            SubpacketData::ExportableCertification(v) => Some(*v),
            _ => None,
        })
        .unwrap_or(true)
    }

    pub fn signature_target(&self) -> Option<(PublicKeyAlgorithm, HashAlgorithm, &Bytes)> {
        self.find_hashed(|d| match d {
            SubpacketData::SignatureTarget(pub_alg, hash_alg, hash) => {
                Some((*pub_alg, *hash_alg, hash))
            }
            _ => None,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    /// Deprecated, same format as V3
    V2 = 2,
    V3 = 3,
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SignatureVersion {
    fn default() -> Self {
        Self::V4
    }
}

/// The parts of a signature that only exist in some versions.
///
/// V2 and V3 signatures carry the creation time and issuer inline, V4
/// signatures keep them in subpackets.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub enum SignatureVersionSpecific {
    V2 {
        created: DateTime<Utc>,
        issuer: KeyId,
    },
    V3 {
        created: DateTime<Utc>,
        issuer: KeyId,
    },
    #[default]
    V4,
}

impl From<&SignatureVersionSpecific> for SignatureVersion {
    fn from(value: &SignatureVersionSpecific) -> Self {
        match value {
            SignatureVersionSpecific::V2 { .. } => SignatureVersion::V2,
            SignatureVersionSpecific::V3 { .. } => SignatureVersion::V3,
            SignatureVersionSpecific::V4 => SignatureVersion::V4,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document.
    /// The signature is calculated over the text data with its line endings
    /// converted to `<CR><LF>`.
    Text = 0x01,
    /// Standalone signature.
    /// This signature is a signature of only its own subpacket contents.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    CertGeneric = 0x10,
    /// Persona certification of a User ID and Public-Key packet.
    CertPersona = 0x11,
    /// Casual certification of a User ID and Public-Key packet.
    CertCasual = 0x12,
    /// Positive certification of a User ID and Public-Key packet.
    CertPositive = 0x13,
    /// Subkey Binding Signature
    /// A statement by the top-level signing key that it owns the subkey,
    /// calculated directly on the primary key and subkey.
    SubkeyBinding = 0x18,
    /// Primary Key Binding Signature
    /// A statement by a signing subkey that it is owned by the primary key.
    KeyBinding = 0x19,
    /// Signature directly on a key
    Key = 0x1F,
    /// Key revocation signature
    KeyRevocation = 0x20,
    /// Subkey revocation signature
    SubkeyRevocation = 0x28,
    /// Certification revocation signature
    CertRevocation = 0x30,
    /// Timestamp signature.
    Timestamp = 0x40,
    /// Third-Party Confirmation signature.
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

#[bitfield(u8, order = lsb)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyFlags {
    /// May be used to certify other keys.
    #[bits(1)]
    certify: bool,
    /// May be used to sign data.
    #[bits(1)]
    sign: bool,
    #[bits(1)]
    encrypt_comms: bool,
    #[bits(1)]
    encrypt_storage: bool,
    /// The private component may have been split.
    #[bits(1)]
    shared: bool,
    #[bits(1)]
    authentication: bool,
    #[bits(1)]
    _reserved: bool,
    /// The private component may be in the possession of more than one person.
    #[bits(1)]
    group: bool,
}

impl<'a> From<&'a [u8]> for KeyFlags {
    fn from(other: &'a [u8]) -> Self {
        KeyFlags::from_bits(other.first().copied().unwrap_or_default())
    }
}

impl From<KeyFlags> for SmallVec<[u8; 1]> {
    fn from(flags: KeyFlags) -> Self {
        smallvec![flags.into_bits()]
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Notation {
    pub readable: bool,
    pub name: Bytes,
    pub value: Bytes,
}

/// Codes for revocation reasons
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RevocationCode {
    /// No reason specified (key revocations or cert revocations)
    NoReason = 0,
    /// Key is superseded (key revocations)
    KeySuperseded = 1,
    /// Key material has been compromised (key revocations)
    KeyCompromised = 2,
    /// Key is retired and no longer used (key revocations)
    KeyRetired = 3,
    /// User ID information is no longer valid (cert revocations)
    CertUserIdInvalid = 32,

    /// Undefined code
    #[num_enum(catch_all)]
    Other(u8),
}

impl PacketTrait for Signature {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
