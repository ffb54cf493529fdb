//! # rbx-connect-core
//!
//! Shared wire protocol for Roblox Connect: the JSON message types exchanged
//! between the relay server and the Roblox clients, and the codec that turns
//! raw WebSocket frames into typed messages and back.
//!
//! This crate is used by the relay server and by anything that wants to talk
//! to it as a client (including the relay's own integration tests).
//! It has zero dependencies on sockets, async runtimes, or the host IDE.
//!
//! # Architecture overview
//!
//! A Roblox game instance runs a companion script that opens a WebSocket to
//! the relay on `127.0.0.1:42121`.  It announces itself with a `connect`
//! frame, streams its output as `log` / `detailed_error` frames, and receives
//! `run_luas` frames carrying code to execute.
//!
//! - **`protocol::messages`** – The typed inbound and outbound messages.
//! - **`protocol::codec`** – Decoding, classification of unknown types and
//!   severities, and the single-frame `run_luas` encoder.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `rbx_connect_core::decode_inbound` instead of the full module path.
pub use protocol::codec::{
    decode_inbound, decode_outbound, encode_outbound, encode_run_command, DecodeError,
    EncodeError,
};
pub use protocol::messages::{Identity, InboundMessage, LogSeverity, OutboundMessage, DEFAULT_PORT};
