use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;
use crate::packet::signature::{
    Signature, SignatureVersionSpecific, Subpacket, SubpacketArea, SubpacketData,
    SubpacketLength,
};
use crate::ser::{time_to_u32, Serialize};

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match &self.config.version_specific {
            SignatureVersionSpecific::V2 { .. } | SignatureVersionSpecific::V3 { .. } => {
                self.to_writer_v3(writer)
            }
            SignatureVersionSpecific::V4 => self.to_writer_v4(writer),
        }
    }

    fn write_len(&self) -> usize {
        let fixed = match self.config.version_specific {
            // version, 5, type, created, issuer, algorithms
            SignatureVersionSpecific::V2 { .. } | SignatureVersionSpecific::V3 { .. } => {
                1 + 1 + 1 + 4 + 8 + 2
            }
            // version, type, algorithms
            SignatureVersionSpecific::V4 => {
                1 + 1 + 2
                    + self.config.hashed_subpackets.write_len()
                    + self.config.unhashed_subpackets.write_len()
            }
        };

        fixed + 2 + self.signature.write_len()
    }
}

impl Signature {
    /// Serializes a v2 or v3 signature.
    fn to_writer_v3<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let (version, created, issuer) = match &self.config.version_specific {
            SignatureVersionSpecific::V2 { created, issuer } => (2u8, created, issuer),
            SignatureVersionSpecific::V3 { created, issuer } => (3u8, created, issuer),
            SignatureVersionSpecific::V4 => bail!("not a v3 signature"),
        };

        writer.write_u8(version)?;
        // length of the hashed material, always 5
        writer.write_u8(5)?;
        writer.write_u8(self.config.typ.into())?;
        writer.write_u32::<BigEndian>(time_to_u32(created))?;
        writer.write_all(issuer.as_ref())?;
        writer.write_u8(self.config.pub_alg.into())?;
        writer.write_u8(self.config.hash_alg.into())?;

        // signed hash value
        writer.write_all(&self.signed_hash_value)?;

        // the actual signature
        self.signature.to_writer(writer)?;

        Ok(())
    }

    /// Serializes a v4 signature.
    fn to_writer_v4<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[
            // version
            4,
            // type
            self.config.typ.into(),
            // public algorithm
            self.config.pub_alg.into(),
            // hash algorithm
            self.config.hash_alg.into(),
        ])?;

        // hashed subpackets
        self.config.hashed_subpackets.to_writer(writer)?;

        // unhashed subpackets
        self.config.unhashed_subpackets.to_writer(writer)?;

        // signed hash value
        writer.write_all(&self.signed_hash_value)?;

        // the actual signature
        self.signature.to_writer(writer)?;

        Ok(())
    }
}

impl SubpacketArea {
    fn content_len(&self) -> usize {
        match self.raw() {
            Some(raw) => raw.len(),
            None => self.iter().map(|p| p.write_len()).sum(),
        }
    }
}

/// The two octet length followed by the subpackets. The length is written
/// even for an empty area.
impl Serialize for SubpacketArea {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.content_len().try_into()?)?;

        match self.raw() {
            Some(raw) => writer.write_all(raw)?,
            None => {
                for packet in self.iter() {
                    packet.to_writer(writer)?;
                }
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.content_len()
    }
}

impl Serialize for SubpacketData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                writer.write_u32::<BigEndian>(time_to_u32(t))?;
            }
            SubpacketData::SignatureExpirationTime(d) | SubpacketData::KeyExpirationTime(d) => {
                writer.write_u32::<BigEndian>(d.num_seconds().try_into()?)?;
            }
            SubpacketData::Issuer(id) => {
                writer.write_all(id.as_ref())?;
            }
            SubpacketData::PreferredSymmetricAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredHashAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredCompressionAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::KeyServerPreferences(prefs) => {
                writer.write_all(prefs)?;
            }
            SubpacketData::KeyFlags(flags) => {
                writer.write_all(flags)?;
            }
            SubpacketData::Features(features) => {
                writer.write_all(features)?;
            }
            SubpacketData::RevocationReason(code, reason) => {
                writer.write_u8((*code).into())?;
                writer.write_all(reason)?;
            }
            SubpacketData::IsPrimary(is_primary) => {
                writer.write_u8((*is_primary).into())?;
            }
            SubpacketData::Revocable(revocable) => {
                writer.write_u8((*revocable).into())?;
            }
            SubpacketData::EmbeddedSignature(sig) => {
                sig.to_writer(writer)?;
            }
            SubpacketData::PreferredKeyServer(server) => {
                writer.write_all(server.as_bytes())?;
            }
            SubpacketData::Notation(notation) => {
                let flags = if notation.readable { 0x80 } else { 0 };
                writer.write_all(&[flags, 0, 0, 0])?;
                writer.write_u16::<BigEndian>(notation.name.len().try_into()?)?;
                writer.write_u16::<BigEndian>(notation.value.len().try_into()?)?;
                writer.write_all(&notation.name)?;
                writer.write_all(&notation.value)?;
            }
            SubpacketData::RevocationKey(rev_key) => {
                writer.write_u8(rev_key.class.into())?;
                writer.write_u8(rev_key.algorithm.into())?;
                writer.write_all(&rev_key.fingerprint[..])?;
            }
            SubpacketData::SignersUserID(body) => {
                writer.write_all(body)?;
            }
            SubpacketData::PolicyURI(uri) => {
                writer.write_all(uri.as_bytes())?;
            }
            SubpacketData::TrustSignature(depth, value) => {
                writer.write_u8(*depth)?;
                writer.write_u8(*value)?;
            }
            SubpacketData::RegularExpression(regexp) => {
                writer.write_all(regexp)?;
            }
            SubpacketData::ExportableCertification(is_exportable) => {
                writer.write_u8((*is_exportable).into())?;
            }
            SubpacketData::SignatureTarget(pub_alg, hash_alg, hash) => {
                writer.write_u8((*pub_alg).into())?;
                writer.write_u8((*hash_alg).into())?;
                writer.write_all(hash)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SubpacketData::SignatureCreationTime(_) => 4,
            SubpacketData::SignatureExpirationTime(_) => 4,
            SubpacketData::KeyExpirationTime(_) => 4,
            SubpacketData::Issuer(_) => 8,
            SubpacketData::PreferredSymmetricAlgorithms(algs) => algs.len(),
            SubpacketData::PreferredHashAlgorithms(algs) => algs.len(),
            SubpacketData::PreferredCompressionAlgorithms(algs) => algs.len(),
            SubpacketData::KeyServerPreferences(prefs) => prefs.len(),
            SubpacketData::KeyFlags(flags) => flags.len(),
            SubpacketData::Features(features) => features.len(),
            SubpacketData::RevocationReason(_, reason) => 1 + reason.len(),
            SubpacketData::IsPrimary(_) => 1,
            SubpacketData::Revocable(_) => 1,
            SubpacketData::EmbeddedSignature(sig) => sig.write_len(),
            SubpacketData::PreferredKeyServer(server) => server.len(),
            SubpacketData::Notation(n) => 4 + 2 + 2 + n.name.len() + n.value.len(),
            SubpacketData::RevocationKey(_) => 1 + 1 + 20,
            SubpacketData::SignersUserID(body) => body.len(),
            SubpacketData::PolicyURI(uri) => uri.len(),
            SubpacketData::TrustSignature(_, _) => 2,
            SubpacketData::RegularExpression(regexp) => regexp.len(),
            SubpacketData::ExportableCertification(_) => 1,
            SubpacketData::SignatureTarget(_, _, hash) => 2 + hash.len(),
        }
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        SubpacketLength::encode((1 + self.data.write_len()).try_into()?).to_writer(writer)?;
        writer.write_u8(self.typ().as_u8(self.is_critical))?;
        self.data.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let len = 1 + self.data.write_len();
        let len_len = u32::try_from(len)
            .map(|l| SubpacketLength::encode(l).write_len())
            .unwrap_or(5);

        len_len + len
    }
}
