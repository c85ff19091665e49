//! Common error types for rawin.

use crate::device::DeviceClass;
use std::any::Any;
use thiserror::Error;

/// Errors reported by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("not implemented")]
    NotImplemented,
    #[error("{call} failed (error {code})")]
    Win32 { call: &'static str, code: u32 },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to spawn pump thread: {0}")]
    Spawn(String),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors surfaced to callers of the receiver and the pump host.
#[derive(Debug, Clone, Error)]
pub enum ReceiverError {
    #[error("receiver has been disposed")]
    Disposed,
    #[error("{0:?} input is not enabled for this receiver")]
    ClassNotEnabled(DeviceClass),
    #[error("pump thread is not running")]
    PumpStopped,
    #[error("message window unavailable: {0}")]
    WindowUnavailable(PumpFault),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("command panicked: {0}")]
    CommandPanicked(String),
    #[error("command was dropped before it ran")]
    CommandDropped,
}

/// Result type for receiver operations.
pub type ReceiverResult<T> = Result<T, ReceiverError>;

/// A failure absorbed on the pump thread and kept as its "last fault".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PumpFault {
    #[error("message window creation failed: {0}")]
    WindowCreation(PlatformError),
    #[error("message retrieval failed: {0}")]
    Message(PlatformError),
    #[error("message handler panicked: {0}")]
    HandlerPanicked(String),
    #[error("command panicked: {0}")]
    CommandPanicked(String),
}

/// Absolute coordinate rescaling failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("coordinate {raw} overflows when scaled to extent {extent} at origin {origin}")]
    Overflow { raw: i32, extent: i32, origin: i32 },
}

/// Extract a readable reason from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".into()
    }
}
