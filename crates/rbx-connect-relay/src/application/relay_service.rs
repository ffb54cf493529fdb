//! Core relay logic: inbound dispatch and outbound broadcast.
//!
//! [`Relay`] owns the [`ClientRegistry`] and a handle to the host.  Every
//! transport event (connection opened, frame received, connection closed) and
//! every host request (broadcast) is an explicit method call.  The
//! infrastructure layer calls these from one event loop, one at a time; unit
//! tests call them directly with fake connections.
//!
//! # Inbound dispatch
//!
//! ```text
//! connect          → registry.set_identity, "Connected: …" popup + info line
//! log              → "[name] [ROBLOX] msg" to the channel for its severity
//! detailed_error   → "[name] [ROBLOX] msg" to the error channel
//! external_execute → broadcast([code]), "Executed from external UI" popup
//! anything else    → ignored
//! ```
//!
//! The `[name] ` prefix is only added when more than one client is connected
//! and the sending client has identified itself.

use std::net::SocketAddr;
use std::sync::Arc;

use rbx_connect_core::{
    decode_inbound, encode_run_command, DecodeError, EncodeError, Identity, InboundMessage,
};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::application::host::HostSink;
use crate::application::registry::{ClientRegistry, Connection, SendError};
use crate::domain::ConnectionId;

/// Tag placed in front of every line that originates from a client.
pub const SOURCE_TAG: &str = "[ROBLOX] ";

/// Popup shown when a broadcast finds nobody to send to.
pub const NO_CLIENTS_MESSAGE: &str = "You don't have any ROBLOX client connected.";

/// Popup shown after a client-initiated `external_execute`.
pub const EXTERNAL_EXECUTE_MESSAGE: &str = "Executed from external UI";

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors reported by relay operations.
///
/// None of these are fatal to the host process.  Each one has already been
/// shown to the host by the time it is returned.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A broadcast was requested while no client was connected.
    #[error("no Roblox client is connected")]
    NoClients,

    /// The listening socket could not be bound at startup.
    #[error("failed to bind relay listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The outbound command could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The relay is inert (never started, failed to bind, or already stopped).
    #[error("the relay server is not running")]
    NotRunning,
}

// ── Broadcast result ──────────────────────────────────────────────────────────

/// One connection that could not be sent to during a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub id: ConnectionId,
    /// Display name of the client, or `"client"` if it never identified.
    pub label: String,
    pub error: SendError,
}

/// Per-connection outcome of a broadcast.
///
/// Partial failure is still `Ok`: failed sends are listed here and were
/// reported to the host individually.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was queued on, in registry order.
    pub delivered: Vec<ConnectionId>,
    pub failed: Vec<SendFailure>,
}

impl BroadcastReport {
    /// `true` if every connection accepted the frame.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ── Relay ─────────────────────────────────────────────────────────────────────

/// Connection registry plus the dispatch rules that act on it.
pub struct Relay<C> {
    registry: ClientRegistry<C>,
    host: Arc<dyn HostSink>,
}

impl<C: Connection> Relay<C> {
    pub fn new(host: Arc<dyn HostSink>) -> Self {
        Self {
            registry: ClientRegistry::new(),
            host,
        }
    }

    pub fn registry(&self) -> &ClientRegistry<C> {
        &self.registry
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// A connection finished its handshake and is now open.
    pub fn connection_opened(&mut self, id: ConnectionId, connection: C) {
        if self.registry.add(id, connection) {
            debug!("connection {id} opened ({} open)", self.registry.len());
            self.host.debug("WebSocket connection established");
        } else {
            warn!("connection {id} was already registered; ignoring duplicate open");
        }
    }

    /// A raw frame arrived on connection `id`.
    ///
    /// Frames for connections that are no longer registered are dropped
    /// without being decoded.
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] for a malformed frame.  Nothing has been
    /// dispatched or changed in that case.
    pub fn handle_frame(&mut self, id: ConnectionId, raw: &[u8]) -> Result<(), DecodeError> {
        if !self.registry.contains(id) {
            trace!("dropping frame for closed connection {id}");
            return Ok(());
        }
        let msg = decode_inbound(raw)?;
        self.dispatch(id, msg);
        Ok(())
    }

    /// Acts on one decoded message from connection `id`.
    pub fn dispatch(&mut self, id: ConnectionId, msg: InboundMessage) {
        trace!("connection {id}: dispatching \"{}\"", msg.kind());
        match msg {
            InboundMessage::Connect(identity) => {
                let line = format!("Connected: {identity}");
                if self.registry.set_identity(id, identity) {
                    self.host.show_info(&line);
                    self.host.info(&line);
                }
            }
            InboundMessage::Log { severity, message } => match severity {
                Some(severity) => {
                    let line = self.client_line(id, &message);
                    self.host.log(severity, &line);
                }
                None => trace!("connection {id}: log with unknown severity ignored"),
            },
            InboundMessage::DetailedError { message } => {
                let line = self.client_line(id, &message);
                self.host.error(&line);
            }
            InboundMessage::ExternalExecute { code } => {
                // Failures were already shown to the host by `broadcast`.
                let _ = self.broadcast(&[code]);
                self.host.show_info(EXTERNAL_EXECUTE_MESSAGE);
            }
            InboundMessage::Unrecognized(kind) => {
                trace!("connection {id}: ignoring unrecognized message type \"{kind}\"");
            }
        }
    }

    /// Connection `id` closed.  Returns its identity if it had one.
    ///
    /// The host hears about the disconnect only for identified clients.
    /// Calling this again for the same id is a no-op.
    pub fn connection_closed(&mut self, id: ConnectionId) -> Option<Identity> {
        let removed = self.registry.remove(id)?;
        debug!("connection {id} closed ({} open)", self.registry.len());

        let identity = removed.identity?;
        self.announce_disconnect(&identity);
        Some(identity)
    }

    /// Sends one `run_luas` frame carrying `codes` to every open connection.
    ///
    /// The frame is encoded once and the same text is queued on every
    /// connection.  A failing connection does not stop the others.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NoClients`] if the registry is empty.  Nothing is sent.
    /// - [`RelayError::Encode`] if the frame cannot be serialized.
    pub fn broadcast<S: AsRef<str>>(&self, codes: &[S]) -> Result<BroadcastReport, RelayError> {
        if self.registry.is_empty() {
            self.host.show_error(NO_CLIENTS_MESSAGE);
            return Err(RelayError::NoClients);
        }

        let frame = encode_run_command(codes).map_err(|e| {
            self.host.show_error(&format!("Failed to encode Lua: {e}"));
            RelayError::from(e)
        })?;

        let mut report = BroadcastReport::default();
        for (id, connection, identity) in self.registry.iter() {
            let label = identity.map_or("client", |i| i.display_name.as_str());
            match connection.send(&frame) {
                Ok(()) => {
                    self.host.show_info(&format!("Executed Lua on {label}"));
                    report.delivered.push(id);
                }
                Err(error) => {
                    warn!("connection {id}: broadcast send failed: {error}");
                    self.host
                        .error(&format!("Failed to send Lua to {label}: {error}"));
                    report.failed.push(SendFailure {
                        id,
                        label: label.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Closes every connection and empties the registry.
    ///
    /// Closing is fire-and-forget.  Each identified client is announced as
    /// disconnected here, since its session's own close event arrives after
    /// the registry has already forgotten it.  Returns how many connections
    /// were closed.
    pub fn close_all(&mut self) -> usize {
        let drained = self.registry.drain();
        for (id, client) in &drained {
            client.connection.close();
            debug!("connection {id} closed by shutdown");
            if let Some(identity) = &client.identity {
                self.announce_disconnect(identity);
            }
        }
        drained.len()
    }

    fn announce_disconnect(&self, identity: &Identity) {
        let line = format!("Disconnected: {identity}");
        self.host.show_warning(&line);
        self.host.info(&line);
    }

    /// Builds the output line for a message from connection `id`.
    fn client_line(&self, id: ConnectionId, message: &str) -> String {
        match self.registry.identity(id) {
            Some(identity) if self.registry.len() > 1 => {
                format!("[{}] {SOURCE_TAG}{message}", identity.name)
            }
            _ => format!("{SOURCE_TAG}{message}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
