//! Message type definitions for the Roblox Connect wire protocol.
//!
//! Every frame is a single JSON object with a `"type"` discriminant and a
//! `"data"` object whose shape depends on the type:
//!
//! ```json
//! {"type":"connect","data":{"displayName":"Builderman","name":"builderman"}}
//! {"type":"log","data":{"type":2,"message":"Infinite yield possible"}}
//! {"type":"run_luas","data":{"luas":["print(1)"]}}
//! ```
//!
//! Inbound frames (client → relay) are modelled by [`InboundMessage`];
//! outbound frames (relay → client) by [`OutboundMessage`].  Two distinct
//! enums make it a compile-time error to send an inbound-only message to a
//! client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Port the relay listens on unless configured otherwise.
///
/// The companion Roblox script hard-codes this value.
pub const DEFAULT_PORT: u16 = 42121;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Identity a client announces with its `connect` frame.
///
/// Used only for display (log prefixes and notification labels), never for
/// authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Player display name, e.g. `"Builderman"`.
    pub display_name: String,
    /// Short account name, used as the `[name] ` log prefix.
    pub name: String,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Identity {
    /// Formats as `"<displayName> (<name>)"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.name)
    }
}

// ── Log severity ──────────────────────────────────────────────────────────────

/// Severity code carried by `log` frames.
///
/// The numeric values match Roblox's `Enum.MessageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    /// Plain `print()` output.
    Output = 0,
    Information = 1,
    Warning = 2,
    Error = 3,
}

impl LogSeverity {
    /// Maps a wire code to a severity.  Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Output),
            1 => Some(Self::Information),
            2 => Some(Self::Warning),
            3 => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns the wire code for this severity.
    pub fn code(self) -> u8 {
        self as u8
    }
}

// ── Client → Relay messages ───────────────────────────────────────────────────

/// A decoded inbound frame.
///
/// Produced by [`crate::protocol::codec::decode_inbound`].  Frames with a
/// `type` the relay does not know decode to [`InboundMessage::Unrecognized`]
/// and are ignored by dispatch rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Client introduces itself.
    Connect(Identity),

    /// A line of game output.
    Log {
        /// `None` when the frame carried a code outside 0..=3 (or no code).
        severity: Option<LogSeverity>,
        message: String,
    },

    /// A script error with a full stack trace.  Always error-level.
    DetailedError { message: String },

    /// An external UI inside the game asks the relay to run code on every
    /// connected client.
    ExternalExecute { code: String },

    /// A well-formed frame whose `type` is not part of the protocol.
    Unrecognized(String),
}

impl InboundMessage {
    /// Returns the wire discriminant for this message.
    pub fn kind(&self) -> &str {
        match self {
            Self::Connect(_) => "connect",
            Self::Log { .. } => "log",
            Self::DetailedError { .. } => "detailed_error",
            Self::ExternalExecute { .. } => "external_execute",
            Self::Unrecognized(kind) => kind,
        }
    }
}

// ── Relay → Client messages ───────────────────────────────────────────────────

/// All messages the relay sends to clients.
///
/// # Serde representation
///
/// Adjacently tagged, so the tag comes first and the payload is nested under
/// `"data"`:
///
/// ```json
/// {"type":"run_luas","data":{"luas":["print(1)","print(2)"]}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Execute each snippet, in order, on the receiving client.
    RunLuas { luas: Vec<String> },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
