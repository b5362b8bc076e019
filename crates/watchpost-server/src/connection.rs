//! WebSocket transport for one session, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{Instrument, debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::protocol::{ProtocolHandler, SessionState};
use crate::session::{Outbound, Session};

type WsSink = SplitSink<WebSocket, Message>;

/// Run a connected session until either side closes it.
///
/// 1. Spawns the writer (queued frames, pings, final close frame)
/// 2. Spawns the liveness watcher
/// 3. Admits the session; if refused, skips straight to cleanup
/// 4. Feeds inbound frames to the handler one at a time
/// 5. Removes the session and lets the writer flush
#[instrument(skip_all, fields(session_id = %session.id()))]
pub async fn run_connection(
    socket: WebSocket,
    session: Arc<Session>,
    outbound: Outbound,
    handler: Arc<ProtocolHandler>,
    config: Arc<ServerConfig>,
) {
    let (sink, mut stream) = socket.split();
    info!("client connected");

    let mut writer = tokio::spawn(
        write_loop(
            sink,
            outbound,
            session.clone(),
            config.heartbeat_interval(),
            config.send_timeout(),
        )
        .in_current_span(),
    );
    let liveness = tokio::spawn(
        watch_liveness(
            session.clone(),
            config.heartbeat_interval(),
            config.heartbeat_timeout(),
        )
        .in_current_span(),
    );

    if handler.on_open(&session) == SessionState::Pending {
        read_loop(&mut stream, &session, &handler).await;
    }

    let _ = handler.on_close(&session);
    liveness.abort();
    if tokio::time::timeout(config.send_timeout() * 2, &mut writer)
        .await
        .is_err()
    {
        warn!("writer did not finish, aborting");
        writer.abort();
    }
    info!(age_ms = session.age().as_millis(), "client disconnected");
}

async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    session: &Arc<Session>,
    handler: &ProtocolHandler,
) {
    loop {
        let frame = tokio::select! {
            () = session.closed() => return,
            frame = stream.next() => frame,
        };
        let message = match frame {
            None => return,
            Some(Err(error)) => {
                let _ = handler.on_error(session, &error);
                return;
            }
            Some(Ok(message)) => message,
        };
        session.mark_alive();

        let state = match message {
            Message::Text(text) => handler.on_message(session, text.as_str()),
            // Some clients send text payloads in binary frames.
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => handler.on_message(session, text),
                Err(_) => handler.on_unreadable(session),
            },
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(frame) => {
                debug!(?frame, "client sent close frame");
                return;
            }
        };
        if matches!(state, SessionState::Rejected | SessionState::Closed) {
            return;
        }
    }
}

async fn write_loop(
    mut sink: WsSink,
    mut outbound: Outbound,
    session: Arc<Session>,
    ping_every: Duration,
    send_timeout: Duration,
) {
    let mut ping = tokio::time::interval(ping_every);
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => {
                let Some(text) = frame else { break };
                if !send(&mut sink, text_frame(&text), send_timeout).await {
                    session.disconnect();
                    break;
                }
            }
            () = session.closed() => break,
            _ = ping.tick() => {
                if !send(&mut sink, Message::Ping(Bytes::new()), send_timeout).await {
                    session.disconnect();
                    break;
                }
            }
        }
    }

    // A reasoned close is server initiated: flush what was queued before it,
    // then tell the client why.
    if let Some(reason) = session.close_reason() {
        while let Ok(text) = outbound.try_recv() {
            if !send(&mut sink, text_frame(&text), send_timeout).await {
                return;
            }
        }
        let frame = CloseFrame {
            code: reason.code.as_u16(),
            reason: reason.reason.to_string().into(),
        };
        debug!(code = frame.code, "sending close frame");
        let _ = send(&mut sink, Message::Close(Some(frame)), send_timeout).await;
    }
    let _ = tokio::time::timeout(send_timeout, sink.close()).await;
}

async fn watch_liveness(session: Arc<Session>, interval: Duration, timeout: Duration) {
    if run_heartbeat(session.clone(), interval, timeout).await == HeartbeatResult::TimedOut {
        warn!(
            quiet_ms = session.last_pong_elapsed().as_millis(),
            "client unresponsive, disconnecting"
        );
        session.disconnect();
    }
}

fn text_frame(text: &str) -> Message {
    Message::Text(text.to_owned().into())
}

async fn send(sink: &mut WsSink, message: Message, limit: Duration) -> bool {
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            debug!(%error, "socket write failed");
            false
        }
        Err(_) => {
            warn!(timeout_ms = limit.as_millis(), "socket write timed out");
            false
        }
    }
}
