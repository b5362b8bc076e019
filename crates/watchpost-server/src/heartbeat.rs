//! Ping/pong liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::session::Session;

/// How the heartbeat loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No inbound activity within the timeout window.
    TimedOut,
    /// The session closed first.
    Closed,
}

/// Watch a session's alive flag until it closes or goes quiet.
///
/// Every `interval` the flag is read and reset. After `timeout / interval`
/// consecutive quiet ticks (at least one) the loop returns
/// [`HeartbeatResult::TimedOut`]. The caller decides what to do with it.
pub async fn run_heartbeat(
    session: Arc<Session>,
    interval: Duration,
    timeout: Duration,
) -> HeartbeatResult {
    let mut ticker = time::interval(interval);
    // First tick fires immediately.
    let _ = ticker.tick().await;
    let interval_ms = interval.as_millis().max(1);
    let max_missed = (timeout.as_millis() / interval_ms).max(1);
    let mut missed: u128 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if session.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = session.closed() => return HeartbeatResult::Closed,
        }
    }
}
