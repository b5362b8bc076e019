//! The consumer a debug frame forwards intercepted events to.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::frame::{EnterEvent, ExceptionEvent, ExitEvent};

/// Failure raised by a delegate while handling an event.
///
/// Returned to whoever invoked the hook. The frame itself stays usable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("delegate failed: {message}")]
pub struct DelegateError {
    message: String,
}

impl DelegateError {
    /// Error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Receives execution events from debug frames.
///
/// Called on the script thread that produced the event, with no lock held.
/// Every method defaults to doing nothing.
pub trait FrameDelegate: Send + Sync {
    /// A script function was entered.
    fn on_enter(&self, event: &EnterEvent) -> Result<(), DelegateError> {
        let _ = event;
        Ok(())
    }

    /// A script exception was thrown.
    fn on_exception_thrown(&self, event: &ExceptionEvent) -> Result<(), DelegateError> {
        let _ = event;
        Ok(())
    }

    /// A script function returned or unwound.
    fn on_exit(&self, event: &ExitEvent) -> Result<(), DelegateError> {
        let _ = event;
        Ok(())
    }
}

/// Either no consumer, or one shared consumer.
#[derive(Clone, Default)]
pub enum Delegate {
    /// Events are accepted and discarded.
    #[default]
    Detached,
    /// Events go to this consumer.
    Attached(Arc<dyn FrameDelegate>),
}

impl Delegate {
    /// Whether a consumer is attached.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => f.write_str("Detached"),
            Self::Attached(_) => f.write_str("Attached(..)"),
        }
    }
}

/// Process-wide holder of the current [`Delegate`].
///
/// Readers clone the whole value under a read lock, so they see either the
/// old or the new delegate, and never invoke it with the lock held.
#[derive(Default)]
pub struct DelegateSlot {
    current: RwLock<Delegate>,
}

impl DelegateSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the delegate.
    pub fn attach(&self, delegate: Arc<dyn FrameDelegate>) {
        *self.current.write() = Delegate::Attached(delegate);
    }

    /// Remove the delegate. Returns whether one was attached.
    pub fn detach(&self) -> bool {
        let previous = std::mem::take(&mut *self.current.write());
        previous.is_attached()
    }

    /// Snapshot of the current delegate.
    pub fn current(&self) -> Delegate {
        self.current.read().clone()
    }
}
