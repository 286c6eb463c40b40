//! # Cryptography module
//!
//! The primitives the packet layer is built on, keyed by their OpenPGP
//! algorithm ids.

// Symmetric

pub mod sym;

// Encryption & Signing

pub mod dsa;
pub mod elgamal;
pub mod rsa;

// Misc

pub mod checksum;
pub mod hash;
pub mod public_key;
