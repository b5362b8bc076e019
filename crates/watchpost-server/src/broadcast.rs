//! Best-effort fan-out to authenticated sessions.

use std::sync::Arc;

use tracing::{debug, warn};
use watchpost_core::DeliveryError;

use crate::registry::SessionRegistry;
use crate::session::Session;

/// Counts from one [`Broadcaster::broadcast`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Authenticated sessions in the snapshot.
    pub recipients: usize,
    /// Frames queued.
    pub delivered: usize,
    /// Sessions skipped because they closed after the snapshot.
    pub skipped: usize,
    /// Sessions whose queue refused the frame.
    pub failed: usize,
}

/// Sends text to every authenticated session.
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    /// Broadcaster over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `message` to every authenticated, open session.
    ///
    /// No-op while the channel is stopped. A failure for one session is
    /// logged and does not affect the others.
    pub fn broadcast(&self, message: &str) -> BroadcastReport {
        let Some(sessions) = self.registry.authenticated_snapshot() else {
            debug!("broadcast dropped: channel stopped");
            return BroadcastReport::default();
        };

        let text: Arc<str> = Arc::from(message);
        let mut report = BroadcastReport {
            recipients: sessions.len(),
            ..BroadcastReport::default()
        };
        for session in &sessions {
            // Waits for an in-flight handshake on this session, so the
            // confirmation is always queued first.
            let _guard = session.lock();
            if !session.is_open() {
                report.skipped += 1;
                continue;
            }
            match Self::deliver(session, text.clone()) {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }
        debug!(
            recipients = report.recipients,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast"
        );
        report
    }

    /// Queue `text` for one session, logging failure.
    ///
    /// Does not take the session lock; callers hold it.
    pub fn deliver(session: &Session, text: Arc<str>) -> Result<(), DeliveryError> {
        session.send_text(text).inspect_err(|error| {
            warn!(session_id = %session.id(), %error, "delivery failed");
        })
    }
}
