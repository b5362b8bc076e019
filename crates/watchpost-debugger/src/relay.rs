//! Delegate that publishes frame events to connected debugger clients.
//!
//! Each event becomes one JSON text frame:
//! `{"event": "enter" | "exception" | "exit", "data": {...}}`.

use std::sync::Weak;

use serde::Serialize;

use crate::controller::DebuggerController;
use crate::delegate::{DelegateError, FrameDelegate};
use crate::frame::{EnterEvent, ExceptionEvent, ExitEvent};

#[derive(Serialize)]
struct Envelope<'a, T> {
    event: &'static str,
    data: &'a T,
}

/// Sends every event through [`DebuggerController::send_message`].
///
/// Holds the controller weakly, since the controller owns its delegate.
pub struct EventRelay {
    controller: Weak<DebuggerController>,
}

impl EventRelay {
    /// Relay into `controller`.
    pub fn new(controller: Weak<DebuggerController>) -> Self {
        Self { controller }
    }

    fn publish<T: Serialize>(&self, event: &'static str, data: &T) -> Result<(), DelegateError> {
        let Some(controller) = self.controller.upgrade() else {
            return Ok(());
        };
        let text = serde_json::to_string(&Envelope { event, data })
            .map_err(|e| DelegateError::new(format!("encode {event}: {e}")))?;
        let _ = controller.send_message(&text);
        Ok(())
    }
}

impl FrameDelegate for EventRelay {
    fn on_enter(&self, event: &EnterEvent) -> Result<(), DelegateError> {
        self.publish("enter", event)
    }

    fn on_exception_thrown(&self, event: &ExceptionEvent) -> Result<(), DelegateError> {
        self.publish("exception", event)
    }

    fn on_exit(&self, event: &ExitEvent) -> Result<(), DelegateError> {
        self.publish("exit", event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use watchpost_server::{Broadcaster, Session, SessionRegistry};

    fn setup() -> (Arc<DebuggerController>, Arc<Session>, watchpost_server::session::Outbound) {
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let controller = Arc::new(DebuggerController::new(registry.clone(), broadcaster));
        controller.start();
        let (session, rx) = Session::channel(16);
        let _ = registry.admit(&session);
        assert!(registry.promote(session.id()));
        (controller, session, rx)
    }

    #[test]
    fn events_published_as_envelopes() {
        let (controller, _session, mut rx) = setup();
        controller.attach_delegate(Arc::new(EventRelay::new(Arc::downgrade(&controller))));

        let frame = controller.current_frame();
        let _ = frame
            .on_enter(&EnterEvent::new("main").with_args(vec![serde_json::json!("x")]))
            .unwrap();
        let _ = frame
            .on_exit(&ExitEvent::returned(serde_json::json!(1)))
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["event"], "enter");
        assert_eq!(first["data"]["function"], "main");
        assert_eq!(first["data"]["args"][0], "x");
        let second: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(second["event"], "exit");
        assert_eq!(second["data"]["result"], 1);
    }

    #[test]
    fn dropped_controller_is_ignored() {
        let relay = {
            let (controller, _session, _rx) = setup();
            EventRelay::new(Arc::downgrade(&controller))
        };
        assert!(relay.on_exception_thrown(&ExceptionEvent::new("late")).is_ok());
    }
}
