//! `DebugServer`: axum router, WebSocket upgrade and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use watchpost_core::CredentialValidator;

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::connection::run_connection;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::protocol::ProtocolHandler;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handshake state machine.
    pub handler: Arc<ProtocolHandler>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server was created.
    pub start_time: Instant,
}

/// The debugger bridge server.
///
/// The listener is bound once by [`DebugServer::listen`]; the channel is
/// opened and closed through the registry (`start`/`stop`).
pub struct DebugServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    handler: Arc<ProtocolHandler>,
    broadcaster: Arc<Broadcaster>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl DebugServer {
    /// Create a server validating keys with `validator`. The channel starts
    /// stopped.
    pub fn new(config: ServerConfig, validator: Arc<dyn CredentialValidator>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let handler = Arc::new(ProtocolHandler::new(
            registry.clone(),
            validator,
            config.principal.clone(),
        ));
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        Self {
            config: Arc::new(config),
            registry,
            handler,
            broadcaster,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router: the debugger endpoint and `/health`.
    pub fn router(&self) -> Router {
        let state = AppState {
            handler: self.handler.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route(&self.config.path, get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve until shutdown is signalled.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, path = %self.config.path, "debugger server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Session registry (channel gate).
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Broadcaster over the registry.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let AppState {
        handler, config, ..
    } = state;
    ws.max_message_size(config.max_message_size)
        .max_frame_size(config.max_message_size)
        .on_upgrade(move |socket| {
            let (session, outbound) = Session::channel(config.send_queue);
            run_connection(socket, session, outbound, handler, config)
        })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.handler.registry(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use watchpost_core::StaticKeyValidator;

    fn make_server() -> DebugServer {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        DebugServer::new(config, Arc::new(StaticKeyValidator::new()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[test]
    fn starts_stopped() {
        let server = make_server();
        assert!(!server.registry().is_started());
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_reports_channel_state() {
        let server = make_server();
        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["started"], false);

        server.registry().start();
        let (_, body) = get_json(server.router(), "/health").await;
        assert_eq!(body["started"], true);
        assert_eq!(body["authenticated"], 0);
    }

    #[tokio::test]
    async fn debugger_path_requires_upgrade() {
        let server = make_server();
        let (status, _) = get_json(server.router(), "/debugger").await;
        assert_ne!(status, StatusCode::NOT_FOUND);
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let (status, _) = get_json(server.router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_path_routed() {
        let config = ServerConfig {
            path: "/dbg".into(),
            ..ServerConfig::default()
        };
        let server = DebugServer::new(config, Arc::new(StaticKeyValidator::new()));
        let (status, _) = get_json(server.router(), "/dbg").await;
        assert_ne!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(server.router(), "/debugger").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }

    #[tokio::test]
    async fn listen_reports_bind_failure() {
        let server = make_server();
        let (addr, _handle) = server.listen().await.unwrap();
        let clash = DebugServer::new(
            ServerConfig {
                port: addr.port(),
                ..ServerConfig::default()
            },
            Arc::new(StaticKeyValidator::new()),
        );
        assert!(matches!(clash.listen().await, Err(ServerError::Bind { .. })));
    }
}
