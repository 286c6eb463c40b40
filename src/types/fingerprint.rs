use std::fmt;

use crate::errors::Result;
use crate::types::KeyVersion;

/// Represents a Fingerprint.
///
/// V2 and V3 keys use an MD5 digest, V4 keys a SHA-1 digest.
#[derive(Clone, Copy, Eq, PartialEq, Hash, derive_more::Debug)]
pub enum Fingerprint {
    #[debug("{}", hex::encode(_0))]
    V3([u8; 16]),
    #[debug("{}", hex::encode(_0))]
    V4([u8; 20]),
}

impl Fingerprint {
    pub fn new(version: KeyVersion, fp: &[u8]) -> Result<Self> {
        let fp = match version {
            KeyVersion::V2 | KeyVersion::V3 => Fingerprint::V3(
                fp.try_into()
                    .map_err(|_| format_err!("invalid v3 fingerprint length {}", fp.len()))?,
            ),
            KeyVersion::V4 => Fingerprint::V4(
                fp.try_into()
                    .map_err(|_| format_err!("invalid v4 fingerprint length {}", fp.len()))?,
            ),
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        };

        Ok(fp)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        match self {
            Self::V3(_) => 16,
            Self::V4(_) => 20,
        }
    }

    pub fn version(&self) -> KeyVersion {
        match self {
            Self::V3(_) => KeyVersion::V3,
            Self::V4(_) => KeyVersion::V4,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::V3(fp) => &fp[..],
            Self::V4(fp) => &fp[..],
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.as_bytes()))
    }
}
