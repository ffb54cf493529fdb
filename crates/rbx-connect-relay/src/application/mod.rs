//! Application layer for rbx-connect-relay.
//!
//! The application layer knows *what* the relay does with each event, but
//! not *how* events arrive.
//!
//! # Responsibilities
//!
//! - Tracking open connections and their identities (`registry`)
//! - Dispatching decoded client messages and broadcasting code (`relay_service`)
//! - Defining the seams to the host UI and to the transport (`host`, `registry::Connection`)
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Tokio task spawning (that happens in the infrastructure layer)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod host;
pub mod registry;
pub mod relay_service;

pub use host::{HostSink, Prompter};
pub use registry::{ClientRegistry, Connection, RemovedClient, SendError};
pub use relay_service::{BroadcastReport, Relay, RelayError, SendFailure};
