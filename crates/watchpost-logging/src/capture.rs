//! In-memory capture of tracing events for assertions in tests.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Module target.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Remaining fields, in emission order.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of the named field, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared handle to the captured events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    /// Snapshot of all events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Whether any event message contains `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.events.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Whether any event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    /// Whether any event carries `name = value`.
    pub fn has_field(&self, name: &str, value: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.field(name) == Some(value))
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.events.lock().iter().filter(|e| e.level == level).count()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl fmt::Debug for CapturedLogs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.events.lock().iter()).finish()
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let val = format!("{value:?}");
        if field.name() == "message" {
            self.message = val;
        } else {
            self.fields.push((field.name().to_owned(), val));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.logs.events.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Install a capturing subscriber as the current thread's default.
///
/// Keep the returned guard alive for the duration of the test. On a
/// current-thread tokio runtime, spawned tasks are captured too.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };

    let guard = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_levels() {
        let (logs, _guard) = capture_logs();
        tracing::info!("session admitted");
        tracing::warn!("delivery failed");
        assert!(logs.has_event(Level::INFO, "session admitted"));
        assert!(logs.has_event(Level::WARN, "delivery failed"));
        assert!(!logs.has_event(Level::ERROR, "delivery failed"));
        assert_eq!(logs.count_at_level(Level::WARN), 1);
    }

    #[test]
    fn captures_display_and_debug_fields() {
        let (logs, _guard) = capture_logs();
        let id = "sess_1";
        tracing::debug!(session_id = %id, queued = 3, reason = ?"bad", "rejected");

        let events = logs.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("session_id"), Some("sess_1"));
        assert_eq!(events[0].field("queued"), Some("3"));
        assert_eq!(events[0].field("reason"), Some("\"bad\""));
        assert!(logs.has_field("session_id", "sess_1"));
    }

    #[test]
    fn clear_resets() {
        let (logs, _guard) = capture_logs();
        tracing::info!("one");
        logs.clear();
        assert!(logs.events().is_empty());
        assert!(!logs.has_message("one"));
    }

    #[test]
    fn capture_is_thread_local() {
        let (logs, _guard) = capture_logs();
        std::thread::spawn(|| tracing::info!("elsewhere"))
            .join()
            .unwrap();
        assert!(!logs.has_message("elsewhere"));
    }
}
