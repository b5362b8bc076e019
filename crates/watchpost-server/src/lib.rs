//! # watchpost-server
//!
//! Session layer of the debugger bridge.
//!
//! - [`SessionRegistry`]: pending and authenticated sets plus the started flag
//! - [`ProtocolHandler`]: per-connection `appKey` handshake
//! - [`Broadcaster`]: best-effort fan-out to authenticated sessions
//! - [`DebugServer`]: axum WebSocket endpoint, heartbeat, `/health`, and
//!   graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod errors;
pub mod health;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use config::ServerConfig;
pub use errors::ServerError;
pub use protocol::{ProtocolHandler, SessionState};
pub use registry::{Admission, Membership, SessionRegistry};
pub use server::DebugServer;
pub use session::Session;
pub use shutdown::ShutdownCoordinator;
