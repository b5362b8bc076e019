//! # watchpost-debugger
//!
//! Interception side of the debugger bridge.
//!
//! A script engine asks the [`DebuggerController`] for the [`DebugFrame`] of
//! the executing thread and calls its hooks on function entry, exception
//! and exit. Frames forward to the shared [`FrameDelegate`] (if any) under a
//! single-flight guard; [`EventRelay`] is a delegate that publishes events
//! to authenticated clients. `DebuggerController::send_message` pushes
//! arbitrary text to those clients.

#![deny(unsafe_code)]

pub mod controller;
pub mod delegate;
pub mod frame;
pub mod relay;

pub use controller::DebuggerController;
pub use delegate::{Delegate, DelegateError, DelegateSlot, FrameDelegate};
pub use frame::{ContextId, DebugFrame, Dispatch, EnterEvent, ExceptionEvent, ExitEvent};
pub use relay::EventRelay;
