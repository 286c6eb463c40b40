//! Parsing functions to parse data using [Buf].

use bytes::{Buf, Bytes};
use snafu::{Backtrace, Snafu};

/// Parsing errors
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("reading {:?}", typ))]
    TooShort {
        typ: Typ,
        #[snafu(backtrace)]
        source: RemainingError,
    },
    #[snafu(display("expected {}, found {}", debug_bytes(expected), debug_bytes(&found[..])))]
    TagMismatch {
        expected: Vec<u8>,
        found: Bytes,
        backtrace: Option<Backtrace>,
    },
}

impl Error {
    /// Returns true if the error indicates that the input was too short.
    pub fn is_incomplete(&self) -> bool {
        match self {
            Self::TooShort { .. } => true,
            Self::TagMismatch { .. } => false,
        }
    }
}

fn debug_bytes(b: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(b) {
        return s.to_string();
    }
    hex::encode(b)
}

#[derive(Debug, Snafu)]
#[snafu(display("needed {}, remaining {}", needed, remaining))]
pub struct RemainingError {
    pub needed: usize,
    pub remaining: usize,
    backtrace: Option<Backtrace>,
}

#[derive(Debug)]
pub enum Typ {
    U8,
    U16Be,
    U32Be,
    Array(usize),
    Take(usize),
    Tag(Vec<u8>),
}

pub trait BufParsing: Buf + Sized {
    fn read_u8(&mut self) -> Result<u8, Error> {
        self.ensure_typ(Typ::U8, 1)?;
        Ok(self.get_u8())
    }

    fn read_be_u16(&mut self) -> Result<u16, Error> {
        self.ensure_typ(Typ::U16Be, 2)?;
        Ok(self.get_u16())
    }

    fn read_be_u32(&mut self) -> Result<u32, Error> {
        self.ensure_typ(Typ::U32Be, 4)?;
        Ok(self.get_u32())
    }

    fn read_array<const C: usize>(&mut self) -> Result<[u8; C], Error> {
        self.ensure_typ(Typ::Array(C), C)?;
        let mut arr = [0u8; C];
        self.copy_to_slice(&mut arr);
        Ok(arr)
    }

    fn read_take(&mut self, size: usize) -> Result<Bytes, Error> {
        self.ensure_typ(Typ::Take(size), size)?;
        Ok(self.copy_to_bytes(size))
    }

    /// Reads `tag.len()` bytes and fails unless they equal `tag`.
    fn read_tag(&mut self, tag: &[u8]) -> Result<(), Error> {
        self.ensure_typ(Typ::Tag(tag.to_vec()), tag.len())?;
        let found = self.copy_to_bytes(tag.len());
        if found != tag {
            return Err(Error::TagMismatch {
                expected: tag.to_vec(),
                found,
                backtrace: snafu::GenerateImplicitData::generate(),
            });
        }
        Ok(())
    }

    fn rest(&mut self) -> Bytes {
        let len = self.remaining();
        self.copy_to_bytes(len)
    }

    fn ensure_typ(&self, typ: Typ, size: usize) -> Result<(), Error> {
        self.ensure_remaining(size)
            .map_err(|source| Error::TooShort { typ, source })
    }

    fn ensure_remaining(&self, size: usize) -> Result<(), RemainingError> {
        if self.remaining() < size {
            return Err(RemainingError {
                needed: size,
                remaining: self.remaining(),
                backtrace: snafu::GenerateImplicitData::generate(),
            });
        }

        Ok(())
    }
}

impl<B: Buf> BufParsing for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_be() {
        let mut buf = &[0x01, 0x02, 0x00, 0x00, 0x01, 0x00, 0xFF][..];
        assert_eq!(buf.read_be_u16().unwrap(), 0x0102);
        assert_eq!(buf.read_be_u32().unwrap(), 0x100);
        assert_eq!(buf.read_u8().unwrap(), 0xFF);

        let err = buf.read_u8().unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_read_take_too_short() {
        let mut buf = &b"abc"[..];
        let err = buf.read_take(4).unwrap_err();
        assert!(err.is_incomplete());
        assert_eq!(buf.remaining(), 3);

        assert_eq!(buf.read_take(2).unwrap(), &b"ab"[..]);
        assert_eq!(buf.rest(), &b"c"[..]);
    }

    #[test]
    fn test_read_tag() {
        let mut buf = &b"PGPx"[..];
        buf.read_tag(b"PGP").unwrap();
        let err = buf.read_tag(b"y").unwrap_err();
        assert!(!err.is_incomplete());
        assert_eq!(err.to_string(), "expected y, found x");
    }
}
