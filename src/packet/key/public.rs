use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use digest::Digest;
use md5::Md5;
use sha1::Sha1;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::{time_to_u32, Serialize};
use crate::types::{
    Fingerprint, KeyId, KeyVersion, PacketHeaderVersion, PublicKeyTrait, PublicParams, Tag,
};

/// Public-Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.1>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicKey {
    packet_header: PacketHeader,
    inner: PubKeyInner,
}

/// Public-Subkey Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.2>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicSubkey {
    packet_header: PacketHeader,
    inner: PubKeyInner,
}

/// The fields shared by all key packets.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PubKeyInner {
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    expiration: Option<u16>,
    public_params: PublicParams,
}

impl PubKeyInner {
    pub fn new(
        version: KeyVersion,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        expiration: Option<u16>,
        public_params: PublicParams,
    ) -> Result<Self> {
        ensure!(
            public_params.matches(algorithm),
            "key material does not match algorithm {:?}",
            algorithm
        );

        match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                // the key id is taken from the modulus
                let PublicParams::RSA { n, .. } = &public_params else {
                    unsupported_err!(
                        "invalid algorithm {:?} for key version {:?}",
                        algorithm,
                        version
                    );
                };
                ensure!(n.len() >= 8, "RSA modulus too small for a key id");
                ensure!(
                    expiration.is_some(),
                    "{:?} keys carry an expiration period",
                    version
                );
            }
            KeyVersion::V4 => {
                ensure!(
                    expiration.is_none(),
                    "V4 keys carry the expiration in a signature"
                );
            }
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        }

        Ok(PubKeyInner {
            version,
            algorithm,
            created_at: created_at.trunc_subsecs(0),
            expiration,
            public_params,
        })
    }

    /// Parses the public key fields, leaving any secret key fields in `i`.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = KeyVersion::from(i.read_u8()?);
        let created_at = i.read_be_u32()?;
        let created_at = Utc
            .timestamp_opt(created_at.into(), 0)
            .single()
            .ok_or_else(|| format_err!("invalid created_at timestamp"))?;

        let expiration = match version {
            KeyVersion::V2 | KeyVersion::V3 => Some(i.read_be_u16()?),
            KeyVersion::V4 => None,
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        };

        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let public_params = PublicParams::from_buf(algorithm, &mut i)?;

        Self::new(version, algorithm, created_at, expiration, public_params)
    }

    pub(crate) fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    fn fingerprint(&self) -> Fingerprint {
        match self.version {
            KeyVersion::V4 => {
                let mut h = Sha1::new();
                self.hash_v4(&mut h);
                Fingerprint::V4(h.finalize().into())
            }
            // V2, V3, other versions are rejected on construction
            _ => {
                let mut h = Md5::new();
                for mpi in self.public_params.mpis() {
                    h.update(mpi.as_ref());
                }
                Fingerprint::V3(h.finalize().into())
            }
        }
    }

    fn hash_v4(&self, h: &mut Sha1) {
        h.update([0x99]);
        h.update((self.write_len() as u16).to_be_bytes());
        h.update([u8::from(self.version)]);
        h.update(time_to_u32(&self.created_at).to_be_bytes());
        h.update([u8::from(self.algorithm)]);
        for mpi in self.public_params.mpis() {
            h.update((mpi.bit_len() as u16).to_be_bytes());
            h.update(mpi.as_ref());
        }
    }

    fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        match (&self.version, &self.public_params) {
            (KeyVersion::V2 | KeyVersion::V3, PublicParams::RSA { n, .. }) => {
                tail_into(n.as_ref(), &mut id);
            }
            _ => {
                tail_into(self.fingerprint().as_bytes(), &mut id);
            }
        }
        KeyId::from(id)
    }

    fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let len: u16 = self.write_len().try_into()?;
        writer.write_u8(0x99)?;
        writer.write_u16::<BigEndian>(len)?;
        self.to_writer(writer)
    }
}

/// Copies the low bytes of `src` into `dst`, right aligned.
fn tail_into(src: &[u8], dst: &mut [u8; 8]) {
    let n = src.len().min(8);
    dst[8 - n..].copy_from_slice(&src[src.len() - n..]);
}

impl Serialize for PubKeyInner {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.into())?;
        writer.write_u32::<BigEndian>(time_to_u32(&self.created_at))?;
        if let Some(expiration) = self.expiration {
            writer.write_u16::<BigEndian>(expiration)?;
        }
        writer.write_u8(self.algorithm.into())?;
        self.public_params.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = 1 + 4 + 1;
        if self.expiration.is_some() {
            sum += 2;
        }
        sum + self.public_params.write_len()
    }
}

macro_rules! impl_public_key {
    ($name:ident, $tag:expr) => {
        impl $name {
            /// Create a new packet from the key fields.
            ///
            /// `expiration` is the validity period in days, only V2 and V3
            /// keys carry it.
            pub fn new(
                packet_version: PacketHeaderVersion,
                version: KeyVersion,
                algorithm: PublicKeyAlgorithm,
                created_at: DateTime<Utc>,
                expiration: Option<u16>,
                public_params: PublicParams,
            ) -> Result<Self> {
                let inner =
                    PubKeyInner::new(version, algorithm, created_at, expiration, public_params)?;
                Ok(Self::from_inner(packet_version, inner))
            }

            pub(crate) fn from_inner(packet_version: PacketHeaderVersion, inner: PubKeyInner) -> Self {
                let packet_header =
                    PacketHeader::new_for_body(packet_version, $tag, inner.write_len());
                $name {
                    packet_header,
                    inner,
                }
            }

            /// Parses the packet body.
            pub fn from_buf<B: Buf>(packet_header: PacketHeader, input: B) -> Result<Self> {
                let inner = PubKeyInner::from_buf(input)?;
                Ok($name {
                    packet_header,
                    inner,
                })
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.inner.to_writer(writer)
            }

            fn write_len(&self) -> usize {
                self.inner.write_len()
            }
        }

        impl PacketTrait for $name {
            fn packet_header(&self) -> &PacketHeader {
                &self.packet_header
            }
        }

        impl PublicKeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.inner.version
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.inner.algorithm
            }

            fn created_at(&self) -> &DateTime<Utc> {
                &self.inner.created_at
            }

            fn expiration(&self) -> Option<u16> {
                self.inner.expiration
            }

            fn public_params(&self) -> &PublicParams {
                &self.inner.public_params
            }

            fn fingerprint(&self) -> Fingerprint {
                self.inner.fingerprint()
            }

            fn key_id(&self) -> KeyId {
                self.inner.key_id()
            }

            fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.inner.serialize_for_hashing(writer)
            }
        }
    };
}

impl_public_key!(PublicKey, Tag::PublicKey);
impl_public_key!(PublicSubkey, Tag::PublicSubkey);
