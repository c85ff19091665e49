//! Receivers bound to the native platform.

use crate::dpi::set_dpi_aware;
use rawin_core::{RawInputReceiver, ReceiverConfig, ReceiverResult};
use std::sync::Arc;

#[cfg(windows)]
pub type NativePlatform = crate::native::WindowsPlatform;

#[cfg(not(windows))]
pub type NativePlatform = crate::unsupported::UnsupportedPlatform;

/// Start a receiver on the current OS.
///
/// With `config.dpi_aware` set, the process is made DPI aware first. Off
/// Windows this always fails with `ReceiverError::WindowUnavailable`.
pub fn start_receiver(config: ReceiverConfig) -> ReceiverResult<RawInputReceiver<NativePlatform>> {
    if config.dpi_aware {
        set_dpi_aware();
    }
    RawInputReceiver::new(Arc::new(NativePlatform::default()), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpi::dpi_awareness;

    #[test]
    fn test_start_receiver_applies_dpi_awareness() {
        let _ = start_receiver(ReceiverConfig::default());
        assert!(dpi_awareness().is_some());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_start_receiver_fails_off_windows() {
        use rawin_core::ReceiverError;

        let config = ReceiverConfig {
            dpi_aware: false,
            ..ReceiverConfig::default()
        };
        assert!(matches!(
            start_receiver(config),
            Err(ReceiverError::WindowUnavailable(_))
        ));
    }
}
