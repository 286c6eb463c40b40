//! # Packet module
//!
//! Handles everything in relationship to packets.

mod header;
mod many;
mod packet_sum;

mod compressed_data;
mod key;
mod literal_data;
mod marker;
mod public_key_encrypted_session_key;
mod signature;
mod sym_encrypted_data;
mod sym_key_encrypted_session_key;
mod user_id;

pub use self::{
    compressed_data::*,
    header::{NewPacketHeader, OldPacketHeader, PacketHeader},
    key::*,
    literal_data::*,
    many::*,
    marker::*,
    packet_sum::*,
    public_key_encrypted_session_key::*,
    signature::*,
    sym_encrypted_data::*,
    sym_key_encrypted_session_key::*,
    user_id::*,
};
