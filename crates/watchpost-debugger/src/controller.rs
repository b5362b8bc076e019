//! Process-wide debugger coordinator.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use watchpost_server::{BroadcastReport, Broadcaster, DebugServer, SessionRegistry};

use crate::delegate::{Delegate, DelegateSlot, FrameDelegate};
use crate::frame::{ContextId, DebugFrame};

type FrameMap = DashMap<ContextId, Arc<DebugFrame>>;

/// Removes the owning thread's frame from one controller when the thread
/// exits.
struct ReleaseOnExit {
    frames: Weak<FrameMap>,
    context: ContextId,
}

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        if let Some(frames) = self.frames.upgrade() {
            let _ = frames.remove(&self.context);
        }
    }
}

thread_local! {
    static RELEASERS: RefCell<Vec<ReleaseOnExit>> = const { RefCell::new(Vec::new()) };
}

/// Arrange for the calling thread's frame in `frames` to be dropped when
/// the thread exits. Idempotent per map.
fn release_on_thread_exit(frames: &Arc<FrameMap>, context: ContextId) {
    // Fails only while the thread's locals are being torn down.
    let _ = RELEASERS.try_with(|releasers| {
        let mut releasers = releasers.borrow_mut();
        releasers.retain(|r| r.frames.strong_count() > 0);
        let target = Arc::downgrade(frames);
        if !releasers.iter().any(|r| r.frames.ptr_eq(&target)) {
            releasers.push(ReleaseOnExit {
                frames: target,
                context,
            });
        }
    });
}

/// Owns the channel lifecycle, one [`DebugFrame`] per execution context,
/// and the `send_message` entry point.
///
/// A frame obtained on its own thread is dropped from the controller when
/// that thread exits. Frames created for another thread's context stay
/// until [`context_released`](Self::context_released) or until that thread
/// touches its frame and later exits.
pub struct DebuggerController {
    registry: Arc<SessionRegistry>,
    broadcaster: Arc<Broadcaster>,
    delegate: Arc<DelegateSlot>,
    frames: Arc<FrameMap>,
    send_lock: Mutex<()>,
}

impl DebuggerController {
    /// Controller over an existing registry and broadcaster.
    pub fn new(registry: Arc<SessionRegistry>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
            delegate: Arc::new(DelegateSlot::new()),
            frames: Arc::new(DashMap::new()),
            send_lock: Mutex::new(()),
        }
    }

    /// Controller driving `server`'s sessions.
    pub fn for_server(server: &DebugServer) -> Self {
        Self::new(server.registry().clone(), server.broadcaster().clone())
    }

    /// Open the channel.
    pub fn start(&self) {
        self.registry.start();
    }

    /// Close the channel, force-closing every session. Returns how many
    /// sessions were closed.
    pub fn stop(&self) -> usize {
        self.registry.stop()
    }

    /// Whether the channel is open.
    pub fn is_started(&self) -> bool {
        self.registry.is_started()
    }

    /// The frame for `context`, created on first use.
    pub fn frame(&self, context: ContextId) -> Arc<DebugFrame> {
        if context == ContextId::current() {
            release_on_thread_exit(&self.frames, context);
        }
        if let Some(frame) = self.frames.get(&context) {
            return frame.value().clone();
        }
        self.frames
            .entry(context)
            .or_insert_with(|| {
                debug!(%context, "debug frame created");
                Arc::new(DebugFrame::new(context, self.delegate.clone()))
            })
            .value()
            .clone()
    }

    /// The frame for the calling thread.
    pub fn current_frame(&self) -> Arc<DebugFrame> {
        self.frame(ContextId::current())
    }

    /// An execution context was created; set up its frame ahead of the
    /// first event.
    pub fn context_created(&self, context: ContextId) -> Arc<DebugFrame> {
        self.frame(context)
    }

    /// An execution context was released; forget its frame.
    ///
    /// Returns whether a frame existed.
    pub fn context_released(&self, context: ContextId) -> bool {
        let removed = self.frames.remove(&context).is_some();
        if removed {
            debug!(%context, "debug frame released");
        }
        removed
    }

    /// Number of live frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Route events from every frame to `delegate`.
    pub fn attach_delegate(&self, delegate: Arc<dyn FrameDelegate>) {
        self.delegate.attach(delegate);
        debug!("frame delegate attached");
    }

    /// Stop routing events. Returns whether a delegate was attached.
    pub fn detach_delegate(&self) -> bool {
        self.delegate.detach()
    }

    /// Current delegate.
    pub fn delegate(&self) -> Delegate {
        self.delegate.current()
    }

    /// Push `text` to every authenticated session.
    ///
    /// Calls are totally ordered: each one's frames are queued for every
    /// session before the next call starts. Delivery failures are logged
    /// and never reach the caller.
    pub fn send_message(&self, text: &str) -> BroadcastReport {
        let _ordered = self.send_lock.lock();
        self.broadcaster.broadcast(text)
    }
}
