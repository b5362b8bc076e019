//! Wire payloads exchanged on the debugger endpoint.
//!
//! Client to server, first frame only: `{"appKey": "<string>"}`.
//! Server to client after authentication: `{"authenticated": true}`, then
//! opaque text frames.

use std::borrow::Cow;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;

/// Authentication request sent by a pending session.
///
/// Fields other than `appKey` are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Application key to validate.
    #[serde(rename = "appKey")]
    pub app_key: String,
}

impl AuthRequest {
    /// Parse the first frame of a pending session.
    ///
    /// Only a JSON object is accepted. A sequence with a string in the
    /// right position is still malformed.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        match serde_json::from_str::<Value>(text)? {
            object @ Value::Object(_) => Ok(serde_json::from_value(object)?),
            _ => Err(serde_json::Error::custom("auth request must be a JSON object").into()),
        }
    }
}

/// Confirmation sent once to a session after it authenticates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfirmation {
    /// Always `true` on the wire.
    pub authenticated: bool,
}

impl AuthConfirmation {
    /// The confirmation payload.
    pub const fn accepted() -> Self {
        Self { authenticated: true }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(self) -> String {
        serde_json::json!({ "authenticated": self.authenticated }).to_string()
    }
}

/// WebSocket close codes used by the endpoint (RFC 6455 section 7.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1012: administrative shutdown of the endpoint.
    ServiceRestart,
    /// 1003: endpoint inactive, protocol violation, or failed auth.
    CannotAccept,
}

impl CloseCode {
    /// Numeric code carried in the close frame.
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::ServiceRestart => 1012,
            Self::CannotAccept => 1003,
        }
    }
}

/// A close code paired with its human readable reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    /// Close code.
    pub code: CloseCode,
    /// Reason phrase.
    pub reason: Cow<'static, str>,
}

impl CloseReason {
    /// Sent to every tracked session when the channel stops.
    pub const fn service_restart() -> Self {
        Self {
            code: CloseCode::ServiceRestart,
            reason: Cow::Borrowed("The endpoint is no longer active."),
        }
    }

    /// Sent to sessions that connect while the channel is stopped.
    pub const fn not_active() -> Self {
        Self {
            code: CloseCode::CannotAccept,
            reason: Cow::Borrowed("The endpoint is not active."),
        }
    }

    /// Sent to a pending session whose first message fails authentication,
    /// whatever the cause.
    pub const fn unknown_from_pending() -> Self {
        Self {
            code: CloseCode::CannotAccept,
            reason: Cow::Borrowed("Unknown message sent by unauthenticated session."),
        }
    }

    /// Sent to an authenticated session that sends anything.
    pub const fn unknown_from_authenticated() -> Self {
        Self {
            code: CloseCode::CannotAccept,
            reason: Cow::Borrowed("Unknown message sent by authenticated session."),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.code.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_request() {
        let req = AuthRequest::parse(r#"{"appKey":"k-123"}"#).unwrap();
        assert_eq!(req.app_key, "k-123");
    }

    #[test]
    fn parse_ignores_extra_fields() {
        let req = AuthRequest::parse(r#"{"appKey":"k","client":"vscode"}"#).unwrap();
        assert_eq!(req.app_key, "k");
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = AuthRequest::parse("hello").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn parse_rejects_missing_key() {
        let err = AuthRequest::parse(r#"{"key":"k"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn parse_rejects_non_string_key() {
        assert!(AuthRequest::parse(r#"{"appKey":42}"#).is_err());
        assert!(AuthRequest::parse(r#"{"appKey":null}"#).is_err());
    }

    #[test]
    fn parse_rejects_non_object() {
        for text in [r#"["VALID"]"#, r#"["appKey"]"#, r#""appKey""#, "7", "null"] {
            let err = AuthRequest::parse(text).unwrap_err();
            assert!(matches!(err, ProtocolError::Malformed(_)), "{text}");
        }
    }

    #[test]
    fn confirmation_wire_shape() {
        let json = AuthConfirmation::accepted().to_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!({"authenticated": true}));
    }

    #[test]
    fn close_codes() {
        assert_eq!(CloseCode::ServiceRestart.as_u16(), 1012);
        assert_eq!(CloseCode::CannotAccept.as_u16(), 1003);
        assert_eq!(CloseReason::service_restart().code, CloseCode::ServiceRestart);
        assert_eq!(CloseReason::not_active().code, CloseCode::CannotAccept);
        assert_eq!(CloseReason::unknown_from_pending().code, CloseCode::CannotAccept);
        assert_eq!(CloseReason::unknown_from_authenticated().code, CloseCode::CannotAccept);
    }

    #[test]
    fn pending_reason_does_not_mention_keys() {
        let reason = CloseReason::unknown_from_pending();
        assert!(!reason.reason.to_lowercase().contains("key"));
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(
            CloseReason::not_active().to_string(),
            "The endpoint is not active. (1003)"
        );
    }
}
