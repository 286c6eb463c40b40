use std::num::TryFromIntError;

use snafu::Snafu;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

pub use crate::parsing::{Error as ParsingError, RemainingError};

/// Error types
///
/// Decoding failures fall into a few groups:
///
/// - malformed input: [`Error::Message`], [`Error::InvalidInput`],
///   [`Error::PacketParsing`] and [`Error::InvalidPacketContent`]
/// - recognised but unsupported features: [`Error::Unsupported`] and
///   [`Error::Unimplemented`]
/// - integrity failures, usually a wrong passphrase or key:
///   [`Error::ChecksumMismatch`] and [`Error::SessionKeyMismatch`]
/// - failures reported by the crypto backends, passed through as they are
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid input"))]
    InvalidInput,
    #[snafu(display("unknown packet tag {tag}"))]
    UnknownTag { tag: u8 },
    #[snafu(display("{context}: checksum mismatch"))]
    ChecksumMismatch { context: &'static str },
    #[snafu(display("quick check failed, the session key does not match"))]
    SessionKeyMismatch,
    #[snafu(display("signature has no issuer key id"))]
    MissingIssuer,
    #[snafu(display("signature carries unknown critical subpacket {typ}"))]
    UnknownCriticalSubpacket { typ: u8 },
    #[snafu(display("signature verification failed"))]
    SignatureVerification,
    #[snafu(display("missing key"))]
    MissingKey,
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(transparent)]
    SignatureError { source: signature::Error },
    #[snafu(transparent)]
    IO { source: std::io::Error },
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
    #[snafu(display("Not yet implemented: {message}"))]
    Unimplemented { message: String },
    /// Signals packet versions and parameters we don't support
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    #[snafu(transparent)]
    Utf8Error { source: std::str::Utf8Error },
    #[snafu(display("Invalid Packet Content {source:?}"))]
    InvalidPacketContent { source: Box<Error> },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
    #[snafu(transparent)]
    PacketParsing { source: ParsingError },
}

impl Error {
    /// Returns true for failures that usually mean the wrong passphrase or
    /// key was used, as opposed to corrupted input.
    pub fn is_integrity_failure(&self) -> bool {
        match self {
            Self::ChecksumMismatch { .. } | Self::SessionKeyMismatch => true,
            Self::InvalidPacketContent { source } => source.is_integrity_failure(),
            _ => false,
        }
    }

    /// Returns true if the input ended before the structure was complete.
    pub fn is_incomplete(&self) -> bool {
        match self {
            Self::PacketParsing { source } => source.is_incomplete(),
            Self::InvalidPacketContent { source } => source.is_incomplete(),
            _ => false,
        }
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::Message { message: err }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::Message {
            message: err.to_string(),
        }
    }
}

#[macro_export]
macro_rules! unimplemented_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unimplemented { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unimplemented { message: format!($fmt, $($arg)+)})
    };
}

#[macro_export]
macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            bail!($fmt, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr,) => ({
        $crate::ensure_eq!($left, $right)
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_failures_are_grouped() {
        let err = Error::ChecksumMismatch {
            context: "secret key",
        };
        assert!(err.is_integrity_failure());
        assert!(Error::SessionKeyMismatch.is_integrity_failure());

        let wrapped = Error::InvalidPacketContent {
            source: Box::new(Error::SessionKeyMismatch),
        };
        assert!(wrapped.is_integrity_failure());

        assert!(!Error::InvalidInput.is_integrity_failure());
        assert!(!format_err!("bad marker").is_integrity_failure());
    }

    #[test]
    fn bail_formats_message() {
        fn check(v: u8) -> Result<()> {
            ensure!(v < 3, "value {} too large", v);
            Ok(())
        }

        assert!(check(1).is_ok());
        assert_eq!(check(7).unwrap_err().to_string(), "value 7 too large");
    }
}
