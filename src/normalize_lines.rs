//! # Line ending normalization module
//!
//! Text signatures are computed over the data with every line ending
//! (`\n`, `\r` or `\r\n`) rewritten as `\r\n`.

use std::iter::Peekable;

/// Wraps a byte iterator and yields the bytes with CRLF line endings.
pub(crate) struct NormalizedCrlf<I>
where
    I: Iterator<Item = u8>,
{
    iter: Peekable<I>,
    pending_lf: bool,
}

impl<I: Iterator<Item = u8>> NormalizedCrlf<I> {
    pub(crate) fn new(iter: I) -> Self {
        NormalizedCrlf {
            iter: iter.peekable(),
            pending_lf: false,
        }
    }
}

impl<I: Iterator<Item = u8>> Iterator for NormalizedCrlf<I> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.pending_lf {
            self.pending_lf = false;
            return Some(b'\n');
        }

        match self.iter.next()? {
            b'\r' => {
                // swallow the \n of a \r\n pair, it is emitted from pending_lf
                if self.iter.peek() == Some(&b'\n') {
                    let _ = self.iter.next();
                }
                self.pending_lf = true;
                Some(b'\r')
            }
            b'\n' => {
                self.pending_lf = true;
                Some(b'\r')
            }
            b => Some(b),
        }
    }
}

/// Normalizes the line endings of `data` to CRLF.
pub(crate) fn normalize_crlf(data: &[u8]) -> Vec<u8> {
    NormalizedCrlf::new(data.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_crlf() {
        let input = "This is a string \n with \r some \n\r\n random newlines\r\r\n\n";
        assert_eq!(
            normalize_crlf(input.as_bytes()),
            b"This is a string \r\n with \r\n some \r\n\r\n random newlines\r\n\r\n\r\n"
        );
    }

    #[test]
    fn test_normalize_crlf_noop() {
        assert_eq!(normalize_crlf(b"a\r\nb"), b"a\r\nb");
        assert_eq!(normalize_crlf(b""), b"");
        assert_eq!(normalize_crlf(b"plain"), b"plain");
    }
}
