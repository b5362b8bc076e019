//! Error taxonomy for the session layer.
//!
//! - [`ProtocolError`]: a session sent something it should not have. The
//!   session is closed; nothing propagates past it.
//! - [`DeliveryError`]: an outbound frame could not be queued for one
//!   session. Logged and isolated to that session.

/// Failure to hand an outbound frame to a session's transport.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The session has already been closed by either peer.
    #[error("session is closed")]
    Closed,
    /// The per-session send queue is full.
    #[error("send queue full ({capacity} frames)")]
    QueueFull {
        /// Queue capacity that was exceeded.
        capacity: usize,
    },
}

/// Reasons a session's inbound message is refused.
///
/// The variants exist for logging only. The close reason sent to the client
/// is the same for every variant raised by a pending session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The first frame was not a JSON object with a string `appKey`.
    #[error("malformed authentication request: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The request was well formed but the key is not known.
    #[error("unknown application key")]
    UnknownCredential,
    /// An authenticated session sent a message.
    #[error("unexpected message from authenticated session")]
    UnexpectedMessage,
    /// A binary frame that is not valid UTF-8.
    #[error("unreadable frame")]
    UnreadableFrame,
}

impl ProtocolError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownCredential => "unknown_credential",
            Self::UnexpectedMessage => "unexpected_message",
            Self::UnreadableFrame => "unreadable_frame",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_display() {
        assert_eq!(DeliveryError::Closed.to_string(), "session is closed");
        assert_eq!(
            DeliveryError::QueueFull { capacity: 8 }.to_string(),
            "send queue full (8 frames)"
        );
    }

    #[test]
    fn malformed_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed authentication request"));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ProtocolError::UnknownCredential.error_kind(), "unknown_credential");
        assert_eq!(ProtocolError::UnexpectedMessage.error_kind(), "unexpected_message");
        assert_eq!(ProtocolError::UnreadableFrame.error_kind(), "unreadable_frame");
    }
}
