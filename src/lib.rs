//! # pgp-packet
//!
//! A codec for the OpenPGP message format as specified in
//! [RFC 2440](https://www.rfc-editor.org/rfc/rfc2440) and
//! [RFC 4880](https://www.rfc-editor.org/rfc/rfc4880).
//!
//! The crate covers the binary packet layer: header framing in both the old
//! and the new length scheme, literal and compressed data, the symmetrically
//! encrypted data container, public and secret key material (V3 and V4),
//! both session key packets, and V3/V4 signatures including the V4
//! sub-packet mechanism.
//!
//! ```rust
//! use pgp_packet::packet::{LiteralData, Packet, PacketTrait};
//! use pgp_packet::ser::Serialize;
//! use pgp_packet::types::PacketHeaderVersion;
//!
//! let lit = LiteralData::from_str(PacketHeaderVersion::New, "hello.txt", "hello world");
//! let packet: Packet = lit.into();
//! let bytes = packet.to_bytes().unwrap();
//!
//! let parsed = pgp_packet::read_packet(&mut &bytes[..]).unwrap().unwrap();
//! assert_eq!(parsed, packet);
//! ```

#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::dbg_macro,
    clippy::print_stdout
)]

#[macro_use]
pub mod errors;
#[macro_use]
mod util;

pub mod config;
pub mod crypto;
pub mod packet;
pub mod parsing;
pub mod ser;
pub mod types;

mod normalize_lines;

pub use self::config::{AlgorithmRegistry, Config, ConfigBuilder};
pub use self::packet::{read_packet, write_packet, Packet, PacketParser};
pub use self::types::SessionKey;
