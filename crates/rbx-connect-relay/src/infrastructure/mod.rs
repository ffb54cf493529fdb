//! Infrastructure layer for rbx-connect-relay.
//!
//! The infrastructure layer handles all I/O: the WebSocket listener, the
//! per-client sessions, and the terminal host used by the binary.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener for client WebSocket connections
//! - Performing the WebSocket HTTP upgrade handshake
//! - Spawning per-session Tokio tasks and the relay event loop
//! - Exposing the host lifecycle (`Extension`)
//! - Rendering host output in a terminal (`console_host`)
//!
//! # What does NOT belong here?
//!
//! - Dispatch and broadcast rules (that is the application layer)
//! - Wire message types (that is `rbx-connect-core`)
//! - Configuration parsing (that is done in `main.rs`)

pub mod console_host;
pub mod extension;
pub mod ws_server;

pub use console_host::{ConsoleHost, StdinPrompter};
pub use extension::Extension;
pub use ws_server::Server;
