//! Logging setup for host applications.

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "rawin_core=info,rawin_platform=info";

/// Install a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .try_init();
}
