//! Protocol module containing message types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_inbound, decode_outbound, encode_outbound, encode_run_command, DecodeError,
    EncodeError,
};
pub use messages::*;
