//! Error types for rawin-platform.
//!
//! The error enum lives in `rawin-core` so the collaborator traits can name it;
//! this module re-exports it and adds the Win32 helpers.

pub use rawin_core::{PlatformError, PlatformResult};

/// Build a [`PlatformError::Win32`] from the calling thread's last error code.
#[cfg(windows)]
pub(crate) fn last_error(call: &'static str) -> PlatformError {
    let code = unsafe { windows_sys::Win32::Foundation::GetLastError() };
    PlatformError::Win32 { call, code }
}
