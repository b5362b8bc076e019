//! # watchpost-core
//!
//! Shared vocabulary for the observing debugger bridge.
//!
//! - **Branded IDs**: [`SessionId`] for transport sessions
//! - **Errors**: [`DeliveryError`] and [`ProtocolError`] via `thiserror`
//! - **Wire payloads**: [`AuthRequest`], [`AuthConfirmation`], [`CloseReason`]
//! - **Credentials**: the [`CredentialValidator`] collaborator interface and
//!   a configured key table, [`StaticKeyValidator`]

#![deny(unsafe_code)]

pub mod credentials;
pub mod errors;
pub mod ids;
pub mod protocol;

pub use credentials::{CredentialValidator, DEFAULT_PRINCIPAL, StaticKeyValidator};
pub use errors::{DeliveryError, ProtocolError};
pub use ids::SessionId;
pub use protocol::{AuthConfirmation, AuthRequest, CloseCode, CloseReason};
