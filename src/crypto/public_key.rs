use num_enum::{FromPrimitive, IntoPrimitive};

/// Public key algorithm identifiers.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.1>
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    RSA = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    RSAEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    ElgamalEncrypt = 16,
    /// DSA (Digital Signature Algorithm)
    DSA = 17,
    /// Elliptic Curve: RFC-6637
    ECDH = 18,
    /// ECDSA: RFC-6637
    ECDSA = 19,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    Elgamal = 20,
    /// Reserved for Diffie-Hellman (X9.42, as defined for IETF-S/MIME)
    DiffieHellman = 21,

    #[num_enum(catch_all)]
    Unknown(#[cfg_attr(test, proptest(strategy = "22u8.."))] u8),
}

impl PublicKeyAlgorithm {
    /// Key material for this algorithm can be decoded by this crate.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::RSA
                | Self::RSAEncrypt
                | Self::RSASign
                | Self::ElgamalEncrypt
                | Self::DSA
                | Self::Elgamal
        )
    }

    pub fn can_sign(self) -> bool {
        matches!(self, Self::RSA | Self::RSASign | Self::DSA)
    }

    pub fn can_encrypt(self) -> bool {
        matches!(
            self,
            Self::RSA | Self::RSAEncrypt | Self::ElgamalEncrypt | Self::Elgamal
        )
    }
}
