//! rawin-platform: native boundary for rawin.
//!
//! This crate provides:
//! - The Win32 implementation of the `rawin-core` collaborator traits
//!   (message-only window, raw input registration, device metadata, key
//!   mapping, screen metrics)
//! - A stand-in platform for other targets
//! - Process DPI awareness and logging setup for host applications
//!
//! ## Module Structure
//!
//! - `error` - Common error types
//! - `native` - Win32 implementation (Windows only)
//! - `unsupported` - Platform that fails to create windows
//! - `receiver` - `start_receiver` on the native platform
//! - `dpi` - DPI awareness
//! - `logging` - `tracing` subscriber setup

mod dpi;
mod error;
mod logging;
mod receiver;
mod registration;
mod unsupported;
mod wide;

#[cfg(windows)]
mod native;

// Re-export error types
pub use error::{PlatformError, PlatformResult};

pub use dpi::{dpi_awareness, set_dpi_aware};
pub use logging::{init_logging, DEFAULT_FILTER};
pub use receiver::{start_receiver, NativePlatform};
pub use unsupported::UnsupportedPlatform;

#[cfg(windows)]
pub use native::WindowsPlatform;
