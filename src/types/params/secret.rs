use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;

use crate::crypto::checksum;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    EncryptedSecretParams, KeyVersion, PlainSecretParams, PublicParams, S2kUsage,
};

/// The secret part of a secret key packet, following the public key fields.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    /// Reads the secret key fields.
    ///
    /// Unprotected material is checked against its additive checksum right away.
    pub fn from_buf<B: Buf>(public_params: &PublicParams, mut i: B) -> Result<Self> {
        let usage = S2kUsage::from(i.read_u8()?);

        match usage {
            S2kUsage::Unprotected => {
                let data = i.rest();
                ensure!(data.len() >= 2, "missing secret key checksum");
                let (mut mpis, check) = data.split_at(data.len() - 2);

                checksum::simple(
                    u16::from_be_bytes([check[0], check[1]]),
                    mpis,
                    "secret key",
                )?;
                let params = PlainSecretParams::from_buf(public_params, &mut mpis)?;
                ensure!(mpis.is_empty(), "trailing bytes in secret key material");

                Ok(SecretParams::Plain(params))
            }
            _ => Ok(SecretParams::Encrypted(EncryptedSecretParams::from_buf(
                usage, i,
            )?)),
        }
    }

    /// Returns the plain parameters, decrypting them if needed.
    pub fn unlock(
        &self,
        passphrase: &[u8],
        version: KeyVersion,
        public_params: &PublicParams,
    ) -> Result<PlainSecretParams> {
        match self {
            SecretParams::Plain(params) => Ok(params.clone()),
            SecretParams::Encrypted(params) => params.unlock(passphrase, version, public_params),
        }
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(params) => {
                writer.write_u8(S2kUsage::Unprotected.into())?;
                params.to_writer(writer)?;
                writer.write_u16::<BigEndian>(params.checksum_simple()?)?;
            }
            SecretParams::Encrypted(params) => {
                params.to_writer(writer)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SecretParams::Plain(params) => 1 + params.write_len() + 2,
            SecretParams::Encrypted(params) => params.write_len(),
        }
    }
}
