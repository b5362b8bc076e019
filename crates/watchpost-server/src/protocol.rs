//! Per-connection authentication state machine.
//!
//! `Pending → Authenticated → Closed`, with `Rejected` reachable from either
//! live state. Every transition for one session runs under that session's
//! exclusion lock, so two messages on the same connection never race.

use std::sync::Arc;

use tracing::{debug, info, warn};
use watchpost_core::{
    AuthConfirmation, AuthRequest, CloseReason, CredentialValidator, ProtocolError,
};

use crate::broadcast::Broadcaster;
use crate::registry::{Admission, Membership, SessionRegistry};
use crate::session::Session;

/// Where a session stands after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Admitted, waiting for its `appKey`.
    Pending,
    /// Authenticated and receiving broadcasts.
    Authenticated,
    /// Closed with CANNOT_ACCEPT by this handler.
    Rejected,
    /// No longer tracked.
    Closed,
}

/// Drives sessions through the handshake against the shared registry.
pub struct ProtocolHandler {
    registry: Arc<SessionRegistry>,
    validator: Arc<dyn CredentialValidator>,
    principal: String,
}

impl ProtocolHandler {
    /// Handler validating keys of `principal`.
    pub fn new(
        registry: Arc<SessionRegistry>,
        validator: Arc<dyn CredentialValidator>,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            validator,
            principal: principal.into(),
        }
    }

    /// The registry this handler mutates.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// A transport connection was accepted.
    pub fn on_open(&self, session: &Arc<Session>) -> SessionState {
        match self.registry.admit(session) {
            Admission::Admitted => SessionState::Pending,
            Admission::Refused => SessionState::Rejected,
        }
    }

    /// A text frame arrived.
    pub fn on_message(&self, session: &Arc<Session>, text: &str) -> SessionState {
        let _guard = session.lock();
        match self.registry.membership(session.id()) {
            Some(Membership::Pending) => match self.authenticate(text) {
                Ok(()) => self.accept(session),
                Err(error) => {
                    debug!(
                        session_id = %session.id(),
                        kind = error.error_kind(),
                        %error,
                        "authentication failed"
                    );
                    self.reject(session, CloseReason::unknown_from_pending())
                }
            },
            Some(Membership::Authenticated) => {
                debug!(
                    session_id = %session.id(),
                    kind = ProtocolError::UnexpectedMessage.error_kind(),
                    "message from authenticated session"
                );
                self.reject(session, CloseReason::unknown_from_authenticated())
            }
            None => {
                debug!(session_id = %session.id(), "message for untracked session ignored");
                SessionState::Closed
            }
        }
    }

    /// A frame arrived that cannot be read as text.
    pub fn on_unreadable(&self, session: &Arc<Session>) -> SessionState {
        let _guard = session.lock();
        let reason = match self.registry.membership(session.id()) {
            Some(Membership::Pending) => CloseReason::unknown_from_pending(),
            Some(Membership::Authenticated) => CloseReason::unknown_from_authenticated(),
            None => return SessionState::Closed,
        };
        debug!(
            session_id = %session.id(),
            kind = ProtocolError::UnreadableFrame.error_kind(),
            "unreadable frame"
        );
        self.reject(session, reason)
    }

    /// Either peer closed the connection.
    pub fn on_close(&self, session: &Arc<Session>) -> SessionState {
        if let Some(was) = self.registry.remove(session.id()) {
            info!(session_id = %session.id(), ?was, "session closed");
        }
        session.disconnect();
        SessionState::Closed
    }

    /// The transport failed.
    pub fn on_error(&self, session: &Arc<Session>, error: &dyn std::fmt::Display) -> SessionState {
        warn!(session_id = %session.id(), %error, "transport error");
        self.on_close(session)
    }

    fn authenticate(&self, text: &str) -> Result<(), ProtocolError> {
        let request = AuthRequest::parse(text)?;
        if self
            .validator
            .credential_exists(&self.principal, &request.app_key)
        {
            Ok(())
        } else {
            Err(ProtocolError::UnknownCredential)
        }
    }

    fn accept(&self, session: &Arc<Session>) -> SessionState {
        if !self.registry.promote(session.id()) {
            // stop() drained the session between the membership check and now.
            return SessionState::Closed;
        }
        info!(session_id = %session.id(), "session authenticated");
        let confirmation: Arc<str> = Arc::from(AuthConfirmation::accepted().to_json());
        // Delivery failure is isolated to this session; it stays authenticated.
        let _ = Broadcaster::deliver(session, confirmation);
        SessionState::Authenticated
    }

    fn reject(&self, session: &Arc<Session>, reason: CloseReason) -> SessionState {
        let _ = self.registry.remove(session.id());
        info!(session_id = %session.id(), reason = %reason, "session rejected");
        if let Err(error) = session.close(reason) {
            warn!(session_id = %session.id(), %error, "failed to close rejected session");
        }
        SessionState::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpost_core::{CloseCode, DEFAULT_PRINCIPAL, StaticKeyValidator};
    use watchpost_logging::capture_logs;

    fn handler() -> ProtocolHandler {
        let registry = Arc::new(SessionRegistry::new());
        registry.start();
        let validator = StaticKeyValidator::for_principal(DEFAULT_PRINCIPAL, ["VALID"]);
        ProtocolHandler::new(registry, Arc::new(validator), DEFAULT_PRINCIPAL)
    }

    fn open(h: &ProtocolHandler) -> (Arc<Session>, crate::session::Outbound) {
        let (s, rx) = Session::channel(8);
        assert_eq!(h.on_open(&s), SessionState::Pending);
        (s, rx)
    }

    fn assert_rejected(h: &ProtocolHandler, s: &Session, reason: &CloseReason) {
        assert!(!s.is_open());
        assert_eq!(s.close_reason().as_ref(), Some(reason));
        assert_eq!(h.registry().membership(s.id()), None);
    }

    #[test]
    fn open_while_stopped_is_rejected() {
        let h = handler();
        let _ = h.registry().stop();
        let (s, _rx) = Session::channel(8);
        assert_eq!(h.on_open(&s), SessionState::Rejected);
        assert_eq!(s.close_reason().unwrap().code, CloseCode::CannotAccept);
        assert_eq!(h.registry().pending_count(), 0);
    }

    #[tokio::test]
    async fn valid_key_authenticates_and_confirms() {
        let h = handler();
        let (s, mut rx) = open(&h);
        assert_eq!(h.on_message(&s, r#"{"appKey":"VALID"}"#), SessionState::Authenticated);
        assert_eq!(h.registry().membership(s.id()), Some(Membership::Authenticated));
        assert_eq!(&*rx.recv().await.unwrap(), r#"{"authenticated":true}"#);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_json_first_message_rejected() {
        let h = handler();
        let (s, _rx) = open(&h);
        assert_eq!(h.on_message(&s, "hello"), SessionState::Rejected);
        assert_rejected(&h, &s, &CloseReason::unknown_from_pending());
    }

    #[test]
    fn missing_app_key_rejected() {
        let h = handler();
        let (s, _rx) = open(&h);
        assert_eq!(h.on_message(&s, r#"{"key":"VALID"}"#), SessionState::Rejected);
        assert_rejected(&h, &s, &CloseReason::unknown_from_pending());
    }

    #[test]
    fn non_object_payloads_rejected() {
        let h = handler();
        for payload in [r#"["VALID"]"#, r#""VALID""#, r#"[{"appKey":"VALID"}]"#] {
            let (s, rx) = open(&h);
            assert_eq!(h.on_message(&s, payload), SessionState::Rejected, "{payload}");
            assert_rejected(&h, &s, &CloseReason::unknown_from_pending());
            drop(rx);
        }
        assert_eq!(h.registry().authenticated_count(), 0);
    }

    #[test]
    fn unknown_key_rejected_with_same_reason() {
        let h = handler();
        let (s, _rx) = open(&h);
        assert_eq!(h.on_message(&s, r#"{"appKey":"NOPE"}"#), SessionState::Rejected);
        assert_rejected(&h, &s, &CloseReason::unknown_from_pending());
    }

    #[test]
    fn key_for_other_principal_rejected() {
        let registry = Arc::new(SessionRegistry::new());
        registry.start();
        let validator = StaticKeyValidator::for_principal("someone-else", ["VALID"]);
        let h = ProtocolHandler::new(registry, Arc::new(validator), DEFAULT_PRINCIPAL);
        let (s, _rx) = open(&h);
        assert_eq!(h.on_message(&s, r#"{"appKey":"VALID"}"#), SessionState::Rejected);
    }

    #[test]
    fn authenticated_session_message_rejected() {
        let h = handler();
        let (s, _rx) = open(&h);
        let _ = h.on_message(&s, r#"{"appKey":"VALID"}"#);
        assert_eq!(h.on_message(&s, r#"{"appKey":"VALID"}"#), SessionState::Rejected);
        assert_rejected(&h, &s, &CloseReason::unknown_from_authenticated());
    }

    #[test]
    fn message_after_rejection_ignored() {
        let h = handler();
        let (s, _rx) = open(&h);
        let _ = h.on_message(&s, "junk");
        assert_eq!(h.on_message(&s, r#"{"appKey":"VALID"}"#), SessionState::Closed);
        assert_eq!(h.registry().authenticated_count(), 0);
    }

    #[test]
    fn unreadable_frame_rejected() {
        let h = handler();
        let (s, _rx) = open(&h);
        assert_eq!(h.on_unreadable(&s), SessionState::Rejected);
        assert_rejected(&h, &s, &CloseReason::unknown_from_pending());
    }

    #[test]
    fn close_removes_from_either_set() {
        let h = handler();
        let (a, _ra) = open(&h);
        let (b, _rb) = open(&h);
        let _ = h.on_message(&b, r#"{"appKey":"VALID"}"#);

        assert_eq!(h.on_close(&a), SessionState::Closed);
        assert_eq!(h.on_error(&b, &"reset by peer"), SessionState::Closed);
        assert_eq!(h.registry().pending_count(), 0);
        assert_eq!(h.registry().authenticated_count(), 0);
        assert!(!b.is_open());
    }

    #[test]
    fn full_queue_on_confirmation_keeps_session_authenticated() {
        let registry = Arc::new(SessionRegistry::new());
        registry.start();
        let validator = StaticKeyValidator::for_principal(DEFAULT_PRINCIPAL, ["VALID"]);
        let h = ProtocolHandler::new(registry, Arc::new(validator), DEFAULT_PRINCIPAL);
        let (s, _rx) = Session::channel(1);
        let _ = h.on_open(&s);
        s.send_text(Arc::from("filler")).unwrap();

        let (logs, _guard) = capture_logs();
        assert_eq!(h.on_message(&s, r#"{"appKey":"VALID"}"#), SessionState::Authenticated);
        assert!(logs.has_event(tracing::Level::WARN, "delivery failed"));
    }

    #[test]
    fn rejection_detail_logged_not_sent() {
        let h = handler();
        let (s, _rx) = open(&h);
        let (logs, _guard) = capture_logs();
        let _ = h.on_message(&s, r#"{"appKey":"NOPE"}"#);
        assert!(logs.has_field("kind", "unknown_credential"));
        assert!(!s.close_reason().unwrap().reason.contains("NOPE"));
    }
}
