use sha1::{Digest, Sha1};

use crate::errors::{Error, Result};

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, v| sum.wrapping_add(u16::from(*v)))
}

/// Compares `actual` against the additive checksum of `data`.
#[inline]
pub fn simple(actual: u16, data: &[u8], context: &'static str) -> Result<()> {
    if actual != calculate_simple(data) {
        return Err(Error::ChecksumMismatch { context });
    }

    Ok(())
}

/// SHA1 checksum, first 20 octets.
#[inline]
pub fn sha1(hash: &[u8], data: &[u8], context: &'static str) -> Result<()> {
    if hash != &Sha1::digest(data)[..] {
        return Err(Error::ChecksumMismatch { context });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_wraps() {
        assert_eq!(calculate_simple(&[]), 0);
        assert_eq!(calculate_simple(&[1, 2, 3]), 6);
        assert_eq!(calculate_simple(&[0xFF; 258]), (0xFFu32 * 258 % 65536) as u16);
        assert_eq!(calculate_simple(&[0xFF; 257]), 0xFFFF);
    }

    #[test]
    fn test_mismatch_is_integrity_failure() {
        let err = simple(7, &[1, 2, 3], "session key").unwrap_err();
        assert!(err.is_integrity_failure());
        assert_eq!(err.to_string(), "session key: checksum mismatch");

        let digest = Sha1::digest(b"abc");
        sha1(&digest, b"abc", "secret key").unwrap();
        assert!(sha1(&digest, b"abd", "secret key").is_err());
    }
}
