use num_enum::{FromPrimitive, IntoPrimitive};

/// Available compression algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.3>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum CompressionAlgorithm {
    #[display("Uncompressed")]
    Uncompressed = 0,
    /// Raw DEFLATE, RFC 1951
    #[display("ZIP")]
    ZIP = 1,
    /// DEFLATE with a zlib wrapper, RFC 1950
    #[display("ZLIB")]
    ZLIB = 2,
    #[display("BZip2")]
    BZip2 = 3,

    #[num_enum(catch_all)]
    #[display("Other({_0})")]
    Other(#[cfg_attr(test, proptest(strategy = "4u8.."))] u8),
}
