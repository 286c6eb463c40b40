use std::io;

use bytes::Buf;
use log::debug;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::Mpi;

/// The algorithm specific value of a signature.
///
/// RSA signatures are a single MPI, DSA signatures the pair `(r, s)`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SignatureBytes {
    Rsa(Mpi),
    Dsa { r: Mpi, s: Mpi },
}

impl SignatureBytes {
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSASign => {
                Ok(SignatureBytes::Rsa(Mpi::from_buf(&mut i)?))
            }
            PublicKeyAlgorithm::DSA => {
                let r = Mpi::from_buf(&mut i)?;
                let s = Mpi::from_buf(&mut i)?;
                Ok(SignatureBytes::Dsa { r, s })
            }
            _ => unsupported_err!("signature algorithm {:?}", alg),
        }
    }

    pub fn mpis(&self) -> Vec<&Mpi> {
        match self {
            SignatureBytes::Rsa(m) => vec![m],
            SignatureBytes::Dsa { r, s } => vec![r, s],
        }
    }
}

impl Serialize for SignatureBytes {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let mpis = self.mpis();
        debug!("writing {} signature MPIs", mpis.len());
        for mpi in mpis {
            mpi.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.mpis().iter().map(|m| m.write_len()).sum()
    }
}
