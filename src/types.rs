mod compression;
mod fingerprint;
mod key_id;
mod key_traits;
mod mpi;
mod packet;
mod params;
mod password;
mod pkesk;
mod revocation_key;
mod s2k;
mod session_key;
mod signature;

pub use self::{
    compression::CompressionAlgorithm,
    fingerprint::Fingerprint,
    key_id::KeyId,
    key_traits::{PublicKeyTrait, SecretKeyTrait},
    mpi::Mpi,
    packet::*,
    params::*,
    password::Password,
    pkesk::PkeskBytes,
    revocation_key::{RevocationKey, RevocationKeyClass},
    s2k::{S2kUsage, StringToKey, StringToKeyType},
    session_key::SessionKey,
    signature::SignatureBytes,
};

pub(crate) use self::s2k::DEFAULT_ITER_COUNT;
