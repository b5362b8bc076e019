//! Handle to one client transport connection.
//!
//! A [`Session`] is shared between the connection's reader loop, its writer
//! task, the registry and the broadcaster. Outbound text goes through a
//! bounded queue drained by the writer; closing cancels a token the writer
//! and reader both watch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use watchpost_core::{CloseReason, DeliveryError, SessionId};

/// Frames queued for a session's writer.
pub type Outbound = mpsc::Receiver<Arc<str>>;

/// One logical client connection.
pub struct Session {
    id: SessionId,
    tx: mpsc::Sender<Arc<str>>,
    capacity: usize,
    closed: CancellationToken,
    close_reason: Mutex<Option<CloseReason>>,
    /// Serializes inbound processing and deliveries for this session.
    exclusive: Mutex<()>,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    connected_at: Instant,
}

impl Session {
    /// New session with an outbound queue of `capacity` frames.
    pub fn channel(capacity: usize) -> (Arc<Self>, Outbound) {
        Self::with_id(SessionId::new(), capacity)
    }

    /// Like [`Session::channel`] with a caller-chosen ID.
    pub fn with_id(id: SessionId, capacity: usize) -> (Arc<Self>, Outbound) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let now = Instant::now();
        let session = Arc::new(Self {
            id,
            tx,
            capacity,
            closed: CancellationToken::new(),
            close_reason: Mutex::new(None),
            exclusive: Mutex::new(()),
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            connected_at: now,
        });
        (session, rx)
    }

    /// Session identity.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Queue one text frame without waiting.
    pub fn send_text(&self, text: Arc<str>) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        self.tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Close with `reason`. The writer flushes queued frames, then sends the
    /// close frame.
    ///
    /// Fails with [`DeliveryError::Closed`] if the session was already closed.
    pub fn close(&self, reason: CloseReason) -> Result<(), DeliveryError> {
        let mut slot = self.close_reason.lock();
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        *slot = Some(reason);
        self.closed.cancel();
        Ok(())
    }

    /// Close without a reason (peer went away, heartbeat expired, write failed).
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    /// Whether neither side has closed the session yet.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Reason given to [`Session::close`], if any.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.lock().clone()
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Take the per-session exclusion lock.
    ///
    /// Not re-entrant: never call back into code that takes it again.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.exclusive.lock()
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Read and reset the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpost_core::CloseCode;

    #[tokio::test]
    async fn send_text_queues_in_order() {
        let (session, mut rx) = Session::channel(8);
        for i in 0..3 {
            session.send_text(Arc::from(format!("m{i}"))).unwrap();
        }
        for i in 0..3 {
            assert_eq!(&*rx.recv().await.unwrap(), format!("m{i}"));
        }
    }

    #[test]
    fn full_queue_reports_capacity() {
        let (session, _rx) = Session::channel(1);
        session.send_text(Arc::from("a")).unwrap();
        let err = session.send_text(Arc::from("b")).unwrap_err();
        assert_eq!(err, DeliveryError::QueueFull { capacity: 1 });
    }

    #[test]
    fn dropped_writer_reports_closed() {
        let (session, rx) = Session::channel(4);
        drop(rx);
        assert_eq!(session.send_text(Arc::from("a")), Err(DeliveryError::Closed));
    }

    #[test]
    fn send_after_close_fails() {
        let (session, _rx) = Session::channel(4);
        session.close(CloseReason::service_restart()).unwrap();
        assert!(!session.is_open());
        assert_eq!(session.send_text(Arc::from("a")), Err(DeliveryError::Closed));
    }

    #[test]
    fn first_close_reason_wins() {
        let (session, _rx) = Session::channel(4);
        session.close(CloseReason::not_active()).unwrap();
        assert_eq!(
            session.close(CloseReason::service_restart()),
            Err(DeliveryError::Closed)
        );
        assert_eq!(session.close_reason().unwrap().code, CloseCode::CannotAccept);
    }

    #[test]
    fn disconnect_has_no_reason() {
        let (session, _rx) = Session::channel(4);
        session.disconnect();
        assert!(!session.is_open());
        assert!(session.close_reason().is_none());
        assert!(session.close(CloseReason::service_restart()).is_err());
    }

    #[tokio::test]
    async fn closed_future_resolves() {
        let (session, _rx) = Session::channel(4);
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.closed().await })
        };
        session.disconnect();
        waiter.await.unwrap();
    }

    #[test]
    fn alive_flag_resets() {
        let (session, _rx) = Session::channel(4);
        assert!(session.check_alive());
        assert!(!session.check_alive());
        session.mark_alive();
        assert!(session.check_alive());
        assert!(session.last_pong_elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (session, _rx) = Session::channel(0);
        session.send_text(Arc::from("a")).unwrap();
    }

    #[test]
    fn ids_are_distinct() {
        let (a, _ra) = Session::channel(1);
        let (b, _rb) = Session::channel(1);
        assert_ne!(a.id(), b.id());
    }
}
