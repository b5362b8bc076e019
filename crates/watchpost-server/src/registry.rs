//! Session registry and channel gate.
//!
//! Tracks sessions in two disjoint sets, pending and authenticated, behind
//! one lock that also guards the started flag. Admission and the started
//! check are one step, so a session admitted while the channel is stopped
//! is refused and never tracked.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use watchpost_core::{CloseReason, SessionId};

use crate::session::Session;

/// Which set a tracked session belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    /// Connected, not yet authenticated.
    Pending,
    /// Authenticated; receives broadcasts.
    Authenticated,
}

/// Outcome of [`SessionRegistry::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Tracked as pending.
    Admitted,
    /// Channel stopped; the session was closed with CANNOT_ACCEPT.
    Refused,
}

#[derive(Default)]
struct Inner {
    started: bool,
    pending: HashMap<SessionId, Arc<Session>>,
    authenticated: HashMap<SessionId, Arc<Session>>,
}

/// Shared session registry. Starts stopped.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    /// Empty, stopped registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel. Idempotent.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if !inner.started {
            inner.started = true;
            info!("debugger channel started");
        }
    }

    /// Close the channel and force-close every tracked session with
    /// SERVICE_RESTART. Returns how many sessions were closed.
    ///
    /// The flag flip and the drain happen under one lock, so no session can
    /// be admitted between them.
    pub fn stop(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut inner = self.inner.lock();
            inner.started = false;
            let pending = std::mem::take(&mut inner.pending);
            let authenticated = std::mem::take(&mut inner.authenticated);
            pending.into_values().chain(authenticated.into_values()).collect()
        };

        let mut closed = 0;
        for session in &drained {
            match session.close(CloseReason::service_restart()) {
                Ok(()) => closed += 1,
                Err(error) => {
                    warn!(session_id = %session.id(), %error, "failed to close session on stop");
                }
            }
        }
        info!(tracked = drained.len(), closed, "debugger channel stopped");
        closed
    }

    /// Whether the channel is started.
    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    /// Track a newly connected session as pending, or refuse it if the
    /// channel is stopped.
    pub fn admit(&self, session: &Arc<Session>) -> Admission {
        {
            let mut inner = self.inner.lock();
            if inner.started {
                let _ = inner.pending.insert(session.id().clone(), session.clone());
                debug!(session_id = %session.id(), "session admitted");
                return Admission::Admitted;
            }
        }
        if let Err(error) = session.close(CloseReason::not_active()) {
            warn!(session_id = %session.id(), %error, "failed to close refused session");
        }
        info!(session_id = %session.id(), "session refused: channel stopped");
        Admission::Refused
    }

    /// Move a session from pending to authenticated.
    ///
    /// Returns `false` if it was not pending (already removed, e.g. by
    /// `stop()`).
    pub fn promote(&self, id: &SessionId) -> bool {
        let mut inner = self.inner.lock();
        match inner.pending.remove(id) {
            Some(session) => {
                let _ = inner.authenticated.insert(id.clone(), session);
                true
            }
            None => false,
        }
    }

    /// Remove a session from whichever set holds it. No-op if absent.
    pub fn remove(&self, id: &SessionId) -> Option<Membership> {
        let mut inner = self.inner.lock();
        if inner.pending.remove(id).is_some() {
            Some(Membership::Pending)
        } else if inner.authenticated.remove(id).is_some() {
            Some(Membership::Authenticated)
        } else {
            None
        }
    }

    /// Current membership of a session.
    pub fn membership(&self, id: &SessionId) -> Option<Membership> {
        let inner = self.inner.lock();
        if inner.pending.contains_key(id) {
            Some(Membership::Pending)
        } else if inner.authenticated.contains_key(id) {
            Some(Membership::Authenticated)
        } else {
            None
        }
    }

    /// Snapshot of the authenticated set, or `None` while stopped.
    pub fn authenticated_snapshot(&self) -> Option<Vec<Arc<Session>>> {
        let inner = self.inner.lock();
        inner
            .started
            .then(|| inner.authenticated.values().cloned().collect())
    }

    /// Number of pending sessions.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Number of authenticated sessions.
    pub fn authenticated_count(&self) -> usize {
        self.inner.lock().authenticated.len()
    }
}
