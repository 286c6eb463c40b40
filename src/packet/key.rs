//! Public and secret key packets, primary keys and subkeys.

mod public;
mod secret;

pub use self::{public::*, secret::*};
