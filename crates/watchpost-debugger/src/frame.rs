//! Per-thread interception point for script execution events.
//!
//! A [`DebugFrame`] forwards enter, exception and exit events to the
//! current delegate with a single-flight guard: while one event is being
//! forwarded, any event raised on the same frame (typically by engine
//! machinery the delegate itself triggers) is dropped. The guard is an RAII
//! value, so it is released on every path out of a hook, panics included.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::trace;

use crate::delegate::{Delegate, DelegateError, DelegateSlot, FrameDelegate};

/// Identity of one script execution context (its thread).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(ThreadId);

impl ContextId {
    /// Context of the calling thread.
    pub fn current() -> Self {
        Self(std::thread::current().id())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Serialize for ContextId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A script function was entered.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnterEvent {
    /// Executing context.
    pub context: ContextId,
    /// Function name, empty for anonymous functions.
    pub function: String,
    /// Receiver.
    pub this: Value,
    /// Call arguments.
    pub args: Vec<Value>,
}

impl EnterEvent {
    /// Entry of `function` on the calling thread, no receiver or arguments.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            context: ContextId::current(),
            function: function.into(),
            this: Value::Null,
            args: Vec::new(),
        }
    }

    /// Set the receiver.
    #[must_use]
    pub fn with_this(mut self, this: Value) -> Self {
        self.this = this;
        self
    }

    /// Set the arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// A script exception was thrown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExceptionEvent {
    /// Executing context.
    pub context: ContextId,
    /// Exception message.
    pub message: String,
    /// Thrown value.
    pub value: Value,
}

impl ExceptionEvent {
    /// Exception with `message` on the calling thread.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            context: ContextId::current(),
            message: message.into(),
            value: Value::Null,
        }
    }

    /// Set the thrown value.
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }
}

/// A script function returned or unwound.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExitEvent {
    /// Executing context.
    pub context: ContextId,
    /// `true` if the function exited by throwing.
    pub thrown: bool,
    /// Return value, or the thrown value.
    pub result: Value,
}

impl ExitEvent {
    /// Normal return with `result`.
    pub fn returned(result: Value) -> Self {
        Self {
            context: ContextId::current(),
            thrown: false,
            result,
        }
    }

    /// Exit by throwing `value`.
    pub fn thrown(value: Value) -> Self {
        Self {
            context: ContextId::current(),
            thrown: true,
            result: value,
        }
    }
}

/// What a hook did with its event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the delegate.
    Forwarded,
    /// No delegate attached.
    Detached,
    /// Dropped by the re-entrancy guard.
    Dropped,
}

struct NotifyingGuard<'a>(&'a AtomicBool);

impl<'a> NotifyingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Event forwarder for one execution context.
pub struct DebugFrame {
    context: ContextId,
    notifying: AtomicBool,
    delegate: Arc<DelegateSlot>,
}

impl DebugFrame {
    /// Frame for `context` reading its delegate from `delegate`.
    pub fn new(context: ContextId, delegate: Arc<DelegateSlot>) -> Self {
        Self {
            context,
            notifying: AtomicBool::new(false),
            delegate,
        }
    }

    /// The context this frame belongs to.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Whether an event is being forwarded right now.
    pub fn is_notifying(&self) -> bool {
        self.notifying.load(Ordering::Acquire)
    }

    /// Function entry hook.
    pub fn on_enter(&self, event: &EnterEvent) -> Result<Dispatch, DelegateError> {
        self.notify("enter", |d| d.on_enter(event))
    }

    /// Exception hook.
    pub fn on_exception_thrown(&self, event: &ExceptionEvent) -> Result<Dispatch, DelegateError> {
        self.notify("exception", |d| d.on_exception_thrown(event))
    }

    /// Function exit hook.
    pub fn on_exit(&self, event: &ExitEvent) -> Result<Dispatch, DelegateError> {
        self.notify("exit", |d| d.on_exit(event))
    }

    /// Line change hook. Not forwarded.
    pub fn on_line_change(&self, _line: u32) {}

    /// `debugger` statement hook. Not forwarded.
    pub fn on_debugger_statement(&self) {}

    fn notify<F>(&self, hook: &'static str, forward: F) -> Result<Dispatch, DelegateError>
    where
        F: FnOnce(&dyn FrameDelegate) -> Result<(), DelegateError>,
    {
        let Some(_guard) = NotifyingGuard::acquire(&self.notifying) else {
            trace!(context = %self.context, hook, "re-entrant event dropped");
            return Ok(Dispatch::Dropped);
        };
        match self.delegate.current() {
            Delegate::Detached => Ok(Dispatch::Detached),
            Delegate::Attached(delegate) => forward(delegate.as_ref()).map(|()| Dispatch::Forwarded),
        }
    }
}

impl fmt::Debug for DebugFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugFrame")
            .field("context", &self.context)
            .field("notifying", &self.is_notifying())
            .finish_non_exhaustive()
    }
}
