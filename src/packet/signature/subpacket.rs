use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, Duration, Utc};
use smallvec::SmallVec;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, KeyId, RevocationKey};

use super::{Notation, RevocationCode, Signature};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
/// Available signature subpacket types
pub enum SubpacketType {
    SignatureCreationTime,
    SignatureExpirationTime,
    ExportableCertification,
    TrustSignature,
    RegularExpression,
    Revocable,
    KeyExpirationTime,
    PreferredSymmetricAlgorithms,
    RevocationKey,
    Issuer,
    Notation,
    PreferredHashAlgorithms,
    PreferredCompressionAlgorithms,
    KeyServerPreferences,
    PreferredKeyServer,
    PrimaryUserId,
    PolicyURI,
    KeyFlags,
    SignersUserID,
    RevocationReason,
    Features,
    SignatureTarget,
    EmbeddedSignature,
    Other(u8),
}

impl SubpacketType {
    pub fn as_u8(&self, is_critical: bool) -> u8 {
        let raw: u8 = match self {
            SubpacketType::SignatureCreationTime => 2,
            SubpacketType::SignatureExpirationTime => 3,
            SubpacketType::ExportableCertification => 4,
            SubpacketType::TrustSignature => 5,
            SubpacketType::RegularExpression => 6,
            SubpacketType::Revocable => 7,
            SubpacketType::KeyExpirationTime => 9,
            SubpacketType::PreferredSymmetricAlgorithms => 11,
            SubpacketType::RevocationKey => 12,
            SubpacketType::Issuer => 16,
            SubpacketType::Notation => 20,
            SubpacketType::PreferredHashAlgorithms => 21,
            SubpacketType::PreferredCompressionAlgorithms => 22,
            SubpacketType::KeyServerPreferences => 23,
            SubpacketType::PreferredKeyServer => 24,
            SubpacketType::PrimaryUserId => 25,
            SubpacketType::PolicyURI => 26,
            SubpacketType::KeyFlags => 27,
            SubpacketType::SignersUserID => 28,
            SubpacketType::RevocationReason => 29,
            SubpacketType::Features => 30,
            SubpacketType::SignatureTarget => 31,
            SubpacketType::EmbeddedSignature => 32,
            SubpacketType::Other(n) => *n,
        };

        if is_critical {
            // set critical bit
            raw | 0b1000_0000
        } else {
            raw
        }
    }

    #[inline]
    pub fn from_u8(n: u8) -> (Self, bool) {
        let is_critical = (n >> 7) == 1;
        // remove critical bit
        let n = n & 0b0111_1111;

        let m = match n {
            2 => SubpacketType::SignatureCreationTime,
            3 => SubpacketType::SignatureExpirationTime,
            4 => SubpacketType::ExportableCertification,
            5 => SubpacketType::TrustSignature,
            6 => SubpacketType::RegularExpression,
            7 => SubpacketType::Revocable,
            9 => SubpacketType::KeyExpirationTime,
            11 => SubpacketType::PreferredSymmetricAlgorithms,
            12 => SubpacketType::RevocationKey,
            16 => SubpacketType::Issuer,
            20 => SubpacketType::Notation,
            21 => SubpacketType::PreferredHashAlgorithms,
            22 => SubpacketType::PreferredCompressionAlgorithms,
            23 => SubpacketType::KeyServerPreferences,
            24 => SubpacketType::PreferredKeyServer,
            25 => SubpacketType::PrimaryUserId,
            26 => SubpacketType::PolicyURI,
            27 => SubpacketType::KeyFlags,
            28 => SubpacketType::SignersUserID,
            29 => SubpacketType::RevocationReason,
            30 => SubpacketType::Features,
            31 => SubpacketType::SignatureTarget,
            32 => SubpacketType::EmbeddedSignature,
            _ => SubpacketType::Other(n),
        };

        (m, is_critical)
    }
}

/// Represents a subpacket length.
///
/// The length counts the type octet and the body.
///
/// Ref <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.1>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum SubpacketLength {
    /// 1 byte encoding, must be less than `192`.
    One(#[cfg_attr(test, proptest(strategy = "0u8..=191"))] u8),
    /// 2 byte encoding, `192..=8383`
    Two(#[cfg_attr(test, proptest(strategy = "192u16..=8383"))] u16),
    /// 5 byte encoding, `0xFF` followed by a 4 byte length
    Five(#[cfg_attr(test, proptest(strategy = "8384u32.."))] u32),
}

impl SubpacketLength {
    /// Parses a subpacket length from the given buffer.
    pub(crate) fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let olen = i.read_u8()?;
        let len = match olen {
            // One-Octet Lengths
            0..=191 => Self::One(olen),
            // Two-Octet Lengths
            192..=254 => {
                let a = i.read_u8()?;
                let l = ((olen as u16 - 192) << 8) + 192 + a as u16;
                Self::Two(l)
            }
            255 => {
                let len = i.read_be_u32()?;
                Self::Five(len)
            }
        };
        Ok(len)
    }

    /// Encodes the given length into a minimal version
    pub(crate) fn encode(len: u32) -> Self {
        match len {
            0..=191 => Self::One(len as u8),
            192..=8383 => Self::Two(len as u16),
            _ => Self::Five(len),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::One(l) => *l as _,
            Self::Two(l) => *l as _,
            Self::Five(l) => *l as _,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for SubpacketLength {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::One(l) => {
                writer.write_u8(*l)?;
            }
            Self::Two(l) => {
                writer.write_u8((((l - 192) / 256) + 192) as u8)?;
                writer.write_u8(((l - 192) % 256) as u8)?;
            }
            Self::Five(l) => {
                writer.write_u8(0xFF)?;
                writer.write_u32::<BigEndian>(*l)?
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Five(_) => 5,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub const fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    /// Construct a new critical subpacket.
    pub const fn critical(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: true,
            data,
        }
    }

    pub fn typ(&self) -> SubpacketType {
        self.data.typ()
    }
}

#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// How long after its creation the signature expires.
    SignatureExpirationTime(Duration),
    /// How long after the key creation the key expires.
    KeyExpirationTime(Duration),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    /// List of symmetric algorithms that indicate which algorithms the key holder prefers to use.
    PreferredSymmetricAlgorithms(SmallVec<[SymmetricKeyAlgorithm; 8]>),
    /// List of hash algorithms that indicate which algorithms the key holder prefers to use.
    PreferredHashAlgorithms(SmallVec<[HashAlgorithm; 8]>),
    /// List of compression algorithms that indicate which algorithms the key holder prefers to use.
    PreferredCompressionAlgorithms(SmallVec<[CompressionAlgorithm; 8]>),
    KeyServerPreferences(#[debug("{}", hex::encode(_0))] SmallVec<[u8; 4]>),
    KeyFlags(#[debug("{}", hex::encode(_0))] SmallVec<[u8; 1]>),
    Features(#[debug("{}", hex::encode(_0))] SmallVec<[u8; 1]>),
    RevocationReason(RevocationCode, #[debug("{:?}", String::from_utf8_lossy(_1))] Bytes),
    IsPrimary(bool),
    Revocable(bool),
    EmbeddedSignature(Box<Signature>),
    PreferredKeyServer(String),
    Notation(Notation),
    RevocationKey(RevocationKey),
    SignersUserID(#[debug("{:?}", String::from_utf8_lossy(_0))] Bytes),
    /// The URI of the policy under which the signature was issued
    PolicyURI(String),
    /// Trust depth and amount.
    TrustSignature(u8, u8),
    RegularExpression(#[debug("{:?}", String::from_utf8_lossy(_0))] Bytes),
    ExportableCertification(bool),
    SignatureTarget(
        PublicKeyAlgorithm,
        HashAlgorithm,
        #[debug("{}", hex::encode(_2))] Bytes,
    ),
}

impl SubpacketData {
    pub fn typ(&self) -> SubpacketType {
        match self {
            SubpacketData::SignatureCreationTime(_) => SubpacketType::SignatureCreationTime,
            SubpacketData::SignatureExpirationTime(_) => SubpacketType::SignatureExpirationTime,
            SubpacketData::KeyExpirationTime(_) => SubpacketType::KeyExpirationTime,
            SubpacketData::Issuer(_) => SubpacketType::Issuer,
            SubpacketData::PreferredSymmetricAlgorithms(_) => {
                SubpacketType::PreferredSymmetricAlgorithms
            }
            SubpacketData::PreferredHashAlgorithms(_) => SubpacketType::PreferredHashAlgorithms,
            SubpacketData::PreferredCompressionAlgorithms(_) => {
                SubpacketType::PreferredCompressionAlgorithms
            }
            SubpacketData::KeyServerPreferences(_) => SubpacketType::KeyServerPreferences,
            SubpacketData::KeyFlags(_) => SubpacketType::KeyFlags,
            SubpacketData::Features(_) => SubpacketType::Features,
            SubpacketData::RevocationReason(_, _) => SubpacketType::RevocationReason,
            SubpacketData::IsPrimary(_) => SubpacketType::PrimaryUserId,
            SubpacketData::Revocable(_) => SubpacketType::Revocable,
            SubpacketData::EmbeddedSignature(_) => SubpacketType::EmbeddedSignature,
            SubpacketData::PreferredKeyServer(_) => SubpacketType::PreferredKeyServer,
            SubpacketData::Notation(_) => SubpacketType::Notation,
            SubpacketData::RevocationKey(_) => SubpacketType::RevocationKey,
            SubpacketData::SignersUserID(_) => SubpacketType::SignersUserID,
            SubpacketData::PolicyURI(_) => SubpacketType::PolicyURI,
            SubpacketData::TrustSignature(_, _) => SubpacketType::TrustSignature,
            SubpacketData::RegularExpression(_) => SubpacketType::RegularExpression,
            SubpacketData::ExportableCertification(_) => SubpacketType::ExportableCertification,
            SubpacketData::SignatureTarget(_, _, _) => SubpacketType::SignatureTarget,
        }
    }
}

/// Outcome of decoding a single subpacket.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SubpacketDecode {
    Known(Subpacket),
    /// The type is not understood and the body was skipped.
    Skipped { typ: u8, critical: bool },
}

/// The hashed or unhashed subpacket area of a V4 signature.
///
/// An area read from the wire keeps its original bytes. Those are what gets
/// written and hashed until the list is modified, so subpackets dropped while
/// decoding never change the signed data.
#[derive(Clone, Default, derive_more::Debug)]
pub struct SubpacketArea {
    packets: Vec<Subpacket>,
    #[debug("{:?}", raw.as_ref().map(hex::encode))]
    raw: Option<Bytes>,
    /// Types of unknown critical subpackets that were dropped.
    skipped_critical: SmallVec<[u8; 2]>,
}

impl SubpacketArea {
    pub fn new(packets: Vec<Subpacket>) -> Self {
        SubpacketArea {
            packets,
            raw: None,
            skipped_critical: SmallVec::new(),
        }
    }

    pub(super) fn decoded(
        packets: Vec<Subpacket>,
        raw: Bytes,
        skipped_critical: SmallVec<[u8; 2]>,
    ) -> Self {
        SubpacketArea {
            packets,
            raw: Some(raw),
            skipped_critical,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subpacket> {
        self.packets.iter()
    }

    pub fn packets(&self) -> &[Subpacket] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Appends a subpacket. The area is written from the list afterwards.
    pub fn push(&mut self, packet: Subpacket) {
        self.detach();
        self.packets.push(packet);
    }

    /// Keeps only the subpackets matching `f`. The area is written from the
    /// list afterwards.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&Subpacket) -> bool,
    {
        self.detach();
        self.packets.retain(f);
    }

    /// Types (without the critical bit) of unknown critical subpackets that
    /// were dropped while decoding.
    pub fn skipped_critical(&self) -> &[u8] {
        &self.skipped_critical
    }

    /// The bytes as read from the wire, if the area is unmodified.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    fn detach(&mut self) {
        self.raw = None;
        self.skipped_critical.clear();
    }
}

/// Compares the decoded subpackets only.
impl PartialEq for SubpacketArea {
    fn eq(&self, other: &Self) -> bool {
        self.packets == other.packets && self.skipped_critical == other.skipped_critical
    }
}

impl Eq for SubpacketArea {}

impl From<Vec<Subpacket>> for SubpacketArea {
    fn from(packets: Vec<Subpacket>) -> Self {
        SubpacketArea::new(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_critical() {
        use SubpacketType::*;

        let cases = [
            SignatureCreationTime,
            SignatureExpirationTime,
            ExportableCertification,
            TrustSignature,
            RegularExpression,
            Revocable,
            KeyExpirationTime,
            PreferredSymmetricAlgorithms,
            RevocationKey,
            Issuer,
            Notation,
            PreferredHashAlgorithms,
            PreferredCompressionAlgorithms,
            KeyServerPreferences,
            PreferredKeyServer,
            PrimaryUserId,
            PolicyURI,
            KeyFlags,
            SignersUserID,
            RevocationReason,
            Features,
            SignatureTarget,
            EmbeddedSignature,
            Other(33),
            Other(101),
        ];
        for case in cases {
            assert_eq!(SubpacketType::from_u8(case.as_u8(false)), (case, false));
            assert_eq!(SubpacketType::from_u8(case.as_u8(true)), (case, true));
        }
    }

    #[test]
    fn test_length_breakpoints() {
        for (len, encoded) in [
            (191u32, &[0xBFu8][..]),
            (192, &[0xC0, 0x00][..]),
            (8383, &[0xDF, 0xFF][..]),
            (8384, &[0xFF, 0x00, 0x00, 0x20, 0xC0][..]),
        ] {
            let l = SubpacketLength::encode(len);
            assert_eq!(l.to_bytes().unwrap(), encoded, "length {len}");
            assert_eq!(SubpacketLength::from_buf(encoded).unwrap().len(), len as usize);
        }
        assert!(SubpacketLength::encode(0).is_empty());
    }

    #[test]
    fn test_area_detaches_on_change() {
        let issuer = Subpacket::regular(SubpacketData::Issuer(KeyId::from([1u8; 8])));
        let mut area = SubpacketArea::decoded(
            vec![issuer.clone()],
            Bytes::from_static(&[9, 0x10, 1, 1, 1, 1, 1, 1, 1, 1, 2, 0xE5]),
            SmallVec::from_slice(&[0x65]),
        );
        assert!(area.raw().is_some());
        assert_eq!(area.skipped_critical(), &[0x65]);

        area.push(Subpacket::regular(SubpacketData::IsPrimary(true)));
        assert!(area.raw().is_none());
        assert!(area.skipped_critical().is_empty());
        assert_eq!(area.len(), 2);

        area.retain(|p| p.typ() == SubpacketType::Issuer);
        assert_eq!(area.packets(), &[issuer][..]);
    }

    proptest! {
        #[test]
        fn subpacket_length_write_len(len: SubpacketLength) {
            let mut buf = Vec::new();
            len.to_writer(&mut buf).unwrap();
            assert_eq!(buf.len(), len.write_len());
        }

        #[test]
        fn subpacket_length_packet_roundtrip(len: SubpacketLength) {
            let mut buf = Vec::new();
            len.to_writer(&mut buf).unwrap();
            let new_len = SubpacketLength::from_buf(&mut &buf[..]).unwrap();
            assert_eq!(len, new_len);
        }
    }
}
