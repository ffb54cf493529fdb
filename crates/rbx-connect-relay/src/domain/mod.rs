//! Domain layer for rbx-connect-relay.
//!
//! Pure types with no dependencies on I/O, networking, or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - Connection identity types
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - Wire message types (those live in `rbx-connect-core`)

pub mod config;
pub mod connection;

pub use config::RelayConfig;
pub use connection::ConnectionId;
