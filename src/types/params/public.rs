use std::io;

use bytes::Buf;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::Mpi;

/// Represent the public parameters for the different algorithms.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.2>
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum PublicParams {
    RSA { n: Mpi, e: Mpi },
    DSA { p: Mpi, q: Mpi, g: Mpi, y: Mpi },
    Elgamal { p: Mpi, g: Mpi, y: Mpi },
}

impl PublicParams {
    /// Reads the algorithm specific key material.
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::from_buf(&mut i)?;
                let e = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::RSA { n, e })
            }
            PublicKeyAlgorithm::DSA => {
                let p = Mpi::from_buf(&mut i)?;
                let q = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::DSA { p, q, g, y })
            }
            PublicKeyAlgorithm::ElgamalEncrypt | PublicKeyAlgorithm::Elgamal => {
                let p = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::Elgamal { p, g, y })
            }
            _ => unsupported_err!("public key algorithm {:?}", alg),
        }
    }

    pub fn mpis(&self) -> Vec<&Mpi> {
        match self {
            PublicParams::RSA { n, e } => vec![n, e],
            PublicParams::DSA { p, q, g, y } => vec![p, q, g, y],
            PublicParams::Elgamal { p, g, y } => vec![p, g, y],
        }
    }

    /// Returns true if `alg` is a valid algorithm id for these parameters.
    pub fn matches(&self, alg: PublicKeyAlgorithm) -> bool {
        match self {
            PublicParams::RSA { .. } => matches!(
                alg,
                PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign
            ),
            PublicParams::DSA { .. } => alg == PublicKeyAlgorithm::DSA,
            PublicParams::Elgamal { .. } => matches!(
                alg,
                PublicKeyAlgorithm::ElgamalEncrypt | PublicKeyAlgorithm::Elgamal
            ),
        }
    }
}

impl Serialize for PublicParams {
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
