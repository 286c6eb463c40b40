use bytes::{Buf, Bytes};
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::{debug, warn};
use smallvec::SmallVec;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::{
    Notation, RevocationCode, Signature, SignatureConfig, SignatureType, SignatureVersion,
    SignatureVersionSpecific, Subpacket, SubpacketArea, SubpacketData, SubpacketDecode,
    SubpacketLength, SubpacketType,
};
use crate::packet::{PacketHeader, MAX_NESTING};
use crate::parsing::BufParsing;
use crate::types::{
    CompressionAlgorithm, KeyId, PacketHeaderVersion, RevocationKey, RevocationKeyClass,
    SignatureBytes, Tag,
};

impl Signature {
    /// Parses a `Signature` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, i: B) -> Result<Self> {
        Self::from_buf_nested(packet_header, i, 0)
    }

    /// Parses a signature embedded `depth` levels deep.
    pub(crate) fn from_buf_nested<B: Buf>(
        packet_header: PacketHeader,
        mut i: B,
        depth: usize,
    ) -> Result<Self> {
        ensure!(
            depth <= MAX_NESTING,
            "signatures nested more than {} levels deep",
            MAX_NESTING
        );

        let version = SignatureVersion::from(i.read_u8()?);
        match version {
            SignatureVersion::V2 | SignatureVersion::V3 => v3_parser(packet_header, version, i),
            SignatureVersion::V4 => v4_parser(packet_header, i, depth),
            SignatureVersion::Other(v) => unsupported_err!("signature version {}", v),
        }
    }
}

/// Convert an epoch timestamp to a `DateTime`
fn dt_from_timestamp(ts: u32) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(i64::from(ts), 0)
        .single()
        .ok_or_else(|| format_err!("invalid timestamp {}", ts))
}

/// Parse a v2 or v3 signature packet
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.2>
fn v3_parser<B: Buf>(
    packet_header: PacketHeader,
    version: SignatureVersion,
    mut i: B,
) -> Result<Signature> {
    // One-octet length of following hashed material. MUST be 5.
    i.read_tag(&[5])?;
    // One-octet signature type.
    let typ = SignatureType::from(i.read_u8()?);
    // Four-octet creation time.
    let created = dt_from_timestamp(i.read_be_u32()?)?;
    // Eight-octet Key ID of signer.
    let issuer = KeyId::from(i.read_array::<8>()?);
    // One-octet public-key algorithm.
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    // One-octet hash algorithm.
    let hash_alg = HashAlgorithm::from(i.read_u8()?);
    // Two-octet field holding left 16 bits of signed hash value.
    let ls_hash = i.read_array::<2>()?;
    // One or more multiprecision integers comprising the signature.
    let sig = SignatureBytes::from_buf(pub_alg, &mut i)?;

    let version_specific = match version {
        SignatureVersion::V2 => SignatureVersionSpecific::V2 { created, issuer },
        _ => SignatureVersionSpecific::V3 { created, issuer },
    };
    let config = SignatureConfig {
        typ,
        pub_alg,
        hash_alg,
        hashed_subpackets: SubpacketArea::default(),
        unhashed_subpackets: SubpacketArea::default(),
        version_specific,
    };

    Ok(Signature::with_header(packet_header, config, ls_hash, sig))
}

/// Parse a v4 signature packet
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3>
fn v4_parser<B: Buf>(packet_header: PacketHeader, mut i: B, depth: usize) -> Result<Signature> {
    // One-octet signature type.
    let typ = SignatureType::from(i.read_u8()?);
    // One-octet public-key algorithm.
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    // One-octet hash algorithm.
    let hash_alg = HashAlgorithm::from(i.read_u8()?);
    // Two-octet scalar octet count for following hashed subpacket data.
    let hsub_len = i.read_be_u16()?;
    // Hashed subpacket data set (zero or more subpackets).
    let hsub = SubpacketArea::from_raw_nested(i.read_take(hsub_len.into())?, depth)?;
    // Two-octet scalar octet count for the following unhashed subpacket data.
    let usub_len = i.read_be_u16()?;
    // Unhashed subpacket data set (zero or more subpackets).
    let usub = SubpacketArea::from_raw_nested(i.read_take(usub_len.into())?, depth)?;
    // Two-octet field holding the left 16 bits of the signed hash value.
    let ls_hash = i.read_array::<2>()?;
    // One or more multiprecision integers comprising the signature.
    let sig = SignatureBytes::from_buf(pub_alg, &mut i)?;

    let config = SignatureConfig::v4(typ, pub_alg, hash_alg, hsub, usub);

    Ok(Signature::with_header(packet_header, config, ls_hash, sig))
}

impl SubpacketArea {
    /// Decodes all subpackets in `raw`, keeping `raw` for writing and hashing.
    pub fn from_raw(raw: Bytes) -> Result<Self> {
        Self::from_raw_nested(raw, 0)
    }

    fn from_raw_nested(raw: Bytes, depth: usize) -> Result<Self> {
        let mut packets = Vec::new();
        let mut skipped_critical = SmallVec::new();

        let mut i = raw.clone();
        while i.has_remaining() {
            match Subpacket::from_buf_nested(&mut i, depth)? {
                SubpacketDecode::Known(packet) => packets.push(packet),
                SubpacketDecode::Skipped { typ, critical } => {
                    if critical {
                        warn!("dropping unknown critical subpacket {}", typ);
                        skipped_critical.push(typ);
                    } else {
                        warn!("dropping unknown subpacket {}", typ);
                    }
                }
            }
        }

        Ok(SubpacketArea::decoded(packets, raw, skipped_critical))
    }
}

impl Subpacket {
    /// Reads a single subpacket: length, type octet and body.
    pub fn from_buf<B: Buf>(i: B) -> Result<SubpacketDecode> {
        Self::from_buf_nested(i, 0)
    }

    fn from_buf_nested<B: Buf>(mut i: B, depth: usize) -> Result<SubpacketDecode> {
        // the subpacket length (1, 2, or 5 octets), including the type octet
        let len = SubpacketLength::from_buf(&mut i)?;
        ensure!(!len.is_empty(), "empty subpacket");
        // the subpacket type (1 octet)
        let (typ, is_critical) = SubpacketType::from_u8(i.read_u8()?);
        let body = i.read_take(len.len() - 1)?;

        subpacket(typ, is_critical, body, depth)
    }
}

fn subpacket(
    typ: SubpacketType,
    is_critical: bool,
    mut body: Bytes,
    depth: usize,
) -> Result<SubpacketDecode> {
    use self::SubpacketType::*;
    debug!("parsing subpacket: {:?} {}", typ, hex::encode(&body));

    let data = match typ {
        SignatureCreationTime => signature_creation_time(&mut body)?,
        SignatureExpirationTime => signature_expiration_time(&mut body)?,
        ExportableCertification => SubpacketData::ExportableCertification(body.read_u8()? == 1),
        TrustSignature => SubpacketData::TrustSignature(body.read_u8()?, body.read_u8()?),
        RegularExpression => SubpacketData::RegularExpression(body.rest()),
        Revocable => SubpacketData::Revocable(body.read_u8()? == 1),
        KeyExpirationTime => key_expiration(&mut body)?,
        PreferredSymmetricAlgorithms => SubpacketData::PreferredSymmetricAlgorithms(
            body.rest()
                .iter()
                .map(|v| SymmetricKeyAlgorithm::from(*v))
                .collect(),
        ),
        RevocationKey => revocation_key(&mut body)?,
        Issuer => SubpacketData::Issuer(KeyId::from(body.read_array::<8>()?)),
        Notation => notation_data(&mut body)?,
        PreferredHashAlgorithms => SubpacketData::PreferredHashAlgorithms(
            body.rest()
                .iter()
                .map(|v| HashAlgorithm::from(*v))
                .collect(),
        ),
        PreferredCompressionAlgorithms => SubpacketData::PreferredCompressionAlgorithms(
            body.rest()
                .iter()
                .map(|v| CompressionAlgorithm::from(*v))
                .collect(),
        ),
        KeyServerPreferences => {
            SubpacketData::KeyServerPreferences(SmallVec::from_slice(&body.rest()))
        }
        PreferredKeyServer => SubpacketData::PreferredKeyServer(read_string(body.rest())?),
        PrimaryUserId => SubpacketData::IsPrimary(body.read_u8()? == 1),
        PolicyURI => SubpacketData::PolicyURI(read_string(body.rest())?),
        KeyFlags => SubpacketData::KeyFlags(SmallVec::from_slice(&body.rest())),
        SignersUserID => SubpacketData::SignersUserID(body.rest()),
        RevocationReason => {
            let code = RevocationCode::from(body.read_u8()?);
            SubpacketData::RevocationReason(code, body.rest())
        }
        Features => SubpacketData::Features(SmallVec::from_slice(&body.rest())),
        SignatureTarget => {
            let pub_alg = PublicKeyAlgorithm::from(body.read_u8()?);
            let hash_alg = HashAlgorithm::from(body.read_u8()?);
            SubpacketData::SignatureTarget(pub_alg, hash_alg, body.rest())
        }
        EmbeddedSignature => embedded_sig(body, depth + 1)?,
        Other(n) => return Ok(SubpacketDecode::Skipped { typ: n, critical: is_critical }),
    };

    Ok(SubpacketDecode::Known(Subpacket { is_critical, data }))
}

/// Parse a signature creation time subpacket
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.4>
fn signature_creation_time<B: Buf>(mut i: B) -> Result<SubpacketData> {
    // 4-octet time field
    let date = dt_from_timestamp(i.read_be_u32()?)?;
    Ok(SubpacketData::SignatureCreationTime(date))
}

/// Parse a signature expiration time subpacket
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.10>
fn signature_expiration_time<B: Buf>(mut i: B) -> Result<SubpacketData> {
    // 4-octet time field, seconds after creation
    let secs = i.read_be_u32()?;
    Ok(SubpacketData::SignatureExpirationTime(Duration::seconds(
        i64::from(secs),
    )))
}

/// Parse a key expiration time subpacket
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.6>
fn key_expiration<B: Buf>(mut i: B) -> Result<SubpacketData> {
    // 4-octet time field, seconds after key creation
    let secs = i.read_be_u32()?;
    Ok(SubpacketData::KeyExpirationTime(Duration::seconds(i64::from(
        secs,
    ))))
}

/// Parse a revocation key subpacket
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.15>
fn revocation_key<B: Buf>(mut i: B) -> Result<SubpacketData> {
    let class = RevocationKeyClass::from(i.read_u8()?);
    let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
    // V4 fingerprint
    let fingerprint = i.read_array::<20>()?;

    Ok(SubpacketData::RevocationKey(RevocationKey::new(
        class,
        algorithm,
        fingerprint,
    )))
}

/// Parse a notation data subpacket
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.16>
fn notation_data<B: Buf>(mut i: B) -> Result<SubpacketData> {
    // Flags, only the human readable bit is defined
    let flags = i.read_array::<4>()?;
    let readable = flags[0] & 0x80 == 0x80;
    let name_len = i.read_be_u16()?;
    let value_len = i.read_be_u16()?;
    let name = i.read_take(name_len.into())?;
    let value = i.read_take(value_len.into())?;

    Ok(SubpacketData::Notation(Notation {
        readable,
        name,
        value,
    }))
}

/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.26>
fn embedded_sig(body: Bytes, depth: usize) -> Result<SubpacketData> {
    let header = PacketHeader::new_for_body(PacketHeaderVersion::New, Tag::Signature, body.len());
    let sig = Signature::from_buf_nested(header, body, depth)?;

    Ok(SubpacketData::EmbeddedSignature(Box::new(sig)))
}

fn read_string(raw: Bytes) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| format_err!("invalid utf8 in subpacket"))
}
