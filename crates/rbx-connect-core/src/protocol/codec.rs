//! JSON codec for the Roblox Connect wire protocol.
//!
//! Wire format: one JSON object per WebSocket frame.
//! ```text
//! {"type":<string>,"data":<object>}
//! ```
//!
//! Decoding is deliberately permissive about *what* a frame says and strict
//! about *how* it says it:
//!
//! - Malformed JSON, or an object without a string `type`, is a [`DecodeError`].
//! - A known `type` whose `data` does not have the expected shape is a
//!   [`DecodeError::InvalidPayload`].
//! - An unknown `type` decodes to [`InboundMessage::Unrecognized`].
//! - A `log` severity is read from any integral number (`2` and `2.0`
//!   alike).  Anything else, or an unknown code, decodes to `severity: None`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{Identity, InboundMessage, LogSeverity, OutboundMessage};

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON (or, for outbound frames, not a known command).
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is valid JSON but has no string `type` field.
    #[error("frame has no \"type\" discriminant")]
    MissingType,

    /// The `data` object of a recognised message type has the wrong shape.
    #[error("invalid \"{kind}\" payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur while encoding an outbound frame.
#[derive(Debug, Error)]
#[error("failed to encode outbound frame: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

// ── Payload shapes ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LogPayload {
    /// Kept as a raw value so that an unknown or non-numeric code does not
    /// reject the whole frame.
    #[serde(rename = "type", default)]
    severity: Value,
    message: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Deserialize)]
struct ExecutePayload {
    code: String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one inbound frame.
///
/// # Errors
///
/// See the module docs: [`DecodeError::Json`], [`DecodeError::MissingType`],
/// or [`DecodeError::InvalidPayload`].
///
/// # Examples
///
/// ```rust
/// use rbx_connect_core::{decode_inbound, InboundMessage, LogSeverity};
///
/// let msg = decode_inbound(br#"{"type":"log","data":{"type":2,"message":"careful"}}"#).unwrap();
/// assert_eq!(
///     msg,
///     InboundMessage::Log { severity: Some(LogSeverity::Warning), message: "careful".into() }
/// );
/// ```
pub fn decode_inbound(raw: &[u8]) -> Result<InboundMessage, DecodeError> {
    let mut value: Value = serde_json::from_slice(raw)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();
    let data = value
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);

    let msg = match kind.as_str() {
        "connect" => InboundMessage::Connect(payload::<Identity>(&kind, data)?),
        "log" => {
            let log: LogPayload = payload(&kind, data)?;
            InboundMessage::Log {
                severity: severity_code(&log.severity).and_then(LogSeverity::from_code),
                message: log.message,
            }
        }
        "detailed_error" => {
            let err: ErrorPayload = payload(&kind, data)?;
            InboundMessage::DetailedError {
                message: err.message,
            }
        }
        "external_execute" => {
            let exec: ExecutePayload = payload(&kind, data)?;
            InboundMessage::ExternalExecute { code: exec.code }
        }
        _ => {
            trace!("unrecognized message type \"{kind}\"");
            InboundMessage::Unrecognized(kind)
        }
    };
    Ok(msg)
}

/// Reads a severity code.  JSON has a single number type, so `2.0` is the
/// same code as `2`.  Other values have no code.
fn severity_code(value: &Value) -> Option<i64> {
    if let Some(code) = value.as_i64() {
        return Some(code);
    }
    let code = value.as_f64()?;
    // Range check keeps the cast exact.
    (code.fract() == 0.0 && code.abs() <= i32::MAX as f64).then_some(code as i64)
}

/// Encodes a `run_luas` command carrying `codes` in the given order.
///
/// # Errors
///
/// Returns [`EncodeError`] if JSON serialization fails.
///
/// # Examples
///
/// ```rust
/// use rbx_connect_core::encode_run_command;
///
/// let frame = encode_run_command(&["print(1)"]).unwrap();
/// assert_eq!(frame, r#"{"type":"run_luas","data":{"luas":["print(1)"]}}"#);
/// ```
pub fn encode_run_command<S: AsRef<str>>(codes: &[S]) -> Result<String, EncodeError> {
    encode_outbound(&OutboundMessage::RunLuas {
        luas: codes.iter().map(|c| c.as_ref().to_owned()).collect(),
    })
}

/// Encodes any outbound message as a JSON text frame.
///
/// # Errors
///
/// Returns [`EncodeError`] if JSON serialization fails.
pub fn encode_outbound(msg: &OutboundMessage) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decodes an outbound frame.  Used on the client side of the protocol.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the frame is not a known outbound command.
pub fn decode_outbound(raw: &[u8]) -> Result<OutboundMessage, DecodeError> {
    Ok(serde_json::from_slice(raw)?)
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload {
        kind: kind.to_owned(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_connect_frame() {
        // Arrange
        let raw = br#"{"type":"connect","data":{"displayName":"Builderman","name":"builderman"}}"#;

        // Act
        let msg = decode_inbound(raw).unwrap();

        // Assert
        assert_eq!(
            msg,
            InboundMessage::Connect(Identity::new("Builderman", "builderman"))
        );
    }

    #[test]
    fn test_decode_log_frame_each_severity() {
        for (code, expected) in [
            (0, LogSeverity::Output),
            (1, LogSeverity::Information),
            (2, LogSeverity::Warning),
            (3, LogSeverity::Error),
        ] {
            let raw = format!(r#"{{"type":"log","data":{{"type":{code},"message":"m"}}}}"#);
            let msg = decode_inbound(raw.as_bytes()).unwrap();
            assert_eq!(
                msg,
                InboundMessage::Log {
                    severity: Some(expected),
                    message: "m".to_string()
                }
            );
        }
    }

    #[test]
    fn test_decode_log_with_unknown_severity_keeps_message() {
        let msg = decode_inbound(br#"{"type":"log","data":{"type":9,"message":"hi"}}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Log {
                severity: None,
                message: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_log_with_integral_float_severity_is_classified() {
        let msg =
            decode_inbound(br#"{"type":"log","data":{"type":2.0,"message":"hi"}}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Log {
                severity: Some(LogSeverity::Warning),
                message: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_log_with_fractional_severity_is_unknown() {
        let msg =
            decode_inbound(br#"{"type":"log","data":{"type":2.5,"message":"hi"}}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Log { severity: None, .. }));
    }

    #[test]
    fn test_decode_log_with_non_numeric_severity_is_unknown() {
        let msg =
            decode_inbound(br#"{"type":"log","data":{"type":"loud","message":"hi"}}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Log { severity: None, .. }));
    }

    #[test]
    fn test_decode_detailed_error_ignores_extra_fields() {
        let msg = decode_inbound(
            br#"{"type":"detailed_error","data":{"type":0,"message":"Stack Begin"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::DetailedError {
                message: "Stack Begin".to_string()
            }
        );
    }

    #[test]
    fn test_decode_external_execute() {
        let msg =
            decode_inbound(br#"{"type":"external_execute","data":{"code":"print(2)"}}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::ExternalExecute {
                code: "print(2)".to_string()
            }
        );
    }

    #[test]
    fn test_decode_unknown_type_is_unrecognized_not_error() {
        let msg = decode_inbound(br#"{"type":"heartbeat","data":{}}"#).unwrap();
        assert_eq!(msg, InboundMessage::Unrecognized("heartbeat".to_string()));
    }

    #[test]
    fn test_decode_malformed_json_fails() {
        let err = decode_inbound(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_missing_type_fails() {
        let err = decode_inbound(br#"{"data":{"message":"x"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingType));
    }

    #[test]
    fn test_decode_non_object_fails_with_missing_type() {
        let err = decode_inbound(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, DecodeError::MissingType));
    }

    #[test]
    fn test_decode_connect_without_name_is_invalid_payload() {
        let err = decode_inbound(br#"{"type":"connect","data":{"displayName":"x"}}"#).unwrap_err();
        match err {
            DecodeError::InvalidPayload { kind, .. } => assert_eq!(kind, "connect"),
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_run_command_preserves_order() {
        let frame = encode_run_command(&["a()", "b()", "c()"]).unwrap();
        assert_eq!(
            frame,
            r#"{"type":"run_luas","data":{"luas":["a()","b()","c()"]}}"#
        );
    }

    #[test]
    fn test_encode_run_command_escapes_code() {
        let frame = encode_run_command(&["print(\"hi\")\n"]).unwrap();
        assert_eq!(
            frame,
            r#"{"type":"run_luas","data":{"luas":["print(\"hi\")\n"]}}"#
        );
    }

    #[test]
    fn test_decode_outbound_then_encode_is_byte_identical() {
        let frame = encode_run_command(&["print(1)", "print(2)"]).unwrap();
        let decoded = decode_outbound(frame.as_bytes()).unwrap();
        assert_eq!(encode_outbound(&decoded).unwrap(), frame);
    }
}
