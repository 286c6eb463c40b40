use std::io;

use bytes::Buf;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::Mpi;

/// Values comprising a Public Key Encrypted Session Key
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PkeskBytes {
    Rsa { mpi: Mpi },
    Elgamal { first: Mpi, second: Mpi },
}

impl PkeskBytes {
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt => Ok(PkeskBytes::Rsa {
                mpi: Mpi::from_buf(&mut i)?,
            }),
            PublicKeyAlgorithm::ElgamalEncrypt | PublicKeyAlgorithm::Elgamal => {
                let first = Mpi::from_buf(&mut i)?;
                let second = Mpi::from_buf(&mut i)?;
                Ok(PkeskBytes::Elgamal { first, second })
            }
            _ => unsupported_err!("session key encryption with {:?}", alg),
        }
    }

    pub fn mpis(&self) -> Vec<&Mpi> {
        match self {
            PkeskBytes::Rsa { mpi } => vec![mpi],
            PkeskBytes::Elgamal { first, second } => vec![first, second],
        }
    }
}

impl Serialize for PkeskBytes {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for mpi in self.mpis() {
            mpi.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.mpis().iter().map(|m| m.write_len()).sum()
    }
}
