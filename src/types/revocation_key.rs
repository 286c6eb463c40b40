use num_enum::{FromPrimitive, IntoPrimitive};

use crate::crypto::public_key::PublicKeyAlgorithm;

/// Class octet of a revocation key sub-packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RevocationKeyClass {
    Default = 0x80,
    /// The relationship is sensitive and should not be exported.
    Sensitive = 0x80 | 0x40,

    #[num_enum(catch_all)]
    Other(u8),
}

/// Designated revoker, see <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.15>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RevocationKey {
    pub class: RevocationKeyClass,
    pub algorithm: PublicKeyAlgorithm,
    pub fingerprint: [u8; 20],
}

impl RevocationKey {
    pub fn new(
        class: RevocationKeyClass,
        algorithm: PublicKeyAlgorithm,
        fingerprint: [u8; 20],
    ) -> Self {
        RevocationKey {
            class,
            algorithm,
            fingerprint,
        }
    }
}
