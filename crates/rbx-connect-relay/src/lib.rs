//! rbx-connect-relay library crate.
//!
//! A local WebSocket relay between a code editor (the *host*) and any number
//! of Roblox game instances running the Roblox Connect companion script.  The
//! host broadcasts Lua snippets to every connected client; clients stream
//! their output back, which the relay routes into the host's output channel.
//!
//! # Architecture
//!
//! ```text
//! Host (IDE extension / terminal)
//!         ↕  HostSink, Prompter, Extension
//! [rbx-connect-relay]
//!   ├── domain/           RelayConfig, ConnectionId
//!   ├── application/      ClientRegistry, Relay (dispatch + broadcast)
//!   └── infrastructure/
//!         ├── ws_server/     accept loop, sessions, event loop (tokio-tungstenite)
//!         ├── extension/     host lifecycle facade
//!         └── console_host/  terminal HostSink + stdin Prompter
//!         ↕  JSON over WebSocket (rbx-connect-core)
//! Roblox clients
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies (no I/O, no async).
//! - `application` depends on `domain` and `rbx-connect-core` only; it never
//!   touches a socket, which is what lets its tests use fake connections.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: configuration and identifiers (no I/O).
pub mod domain;

/// Application layer: registry, dispatch, broadcast.
pub mod application;

/// Infrastructure layer: WebSocket server and host adapters.
pub mod infrastructure;
