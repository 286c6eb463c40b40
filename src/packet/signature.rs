//! Signature packets.
//!
//! Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>

mod config;
mod de;
mod ser;
mod subpacket;
mod types;

pub use self::{config::*, subpacket::*, types::*};
