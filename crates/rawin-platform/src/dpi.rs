//! Process DPI awareness.
//!
//! Absolute raw mouse coordinates are scaled against the screen metrics the
//! process sees. Unless the process is Per-Monitor V2 aware, those metrics are
//! logical pixels and absolute positions fall short of the real screen edge on
//! scaled displays.

use std::sync::OnceLock;
use tracing::{info, warn};

static AWARENESS: OnceLock<bool> = OnceLock::new();

/// Make the process Per-Monitor V2 DPI aware. Only the first call reaches the
/// OS; later calls report its outcome.
///
/// Returns whether the process is DPI aware. Always `false` off Windows.
pub fn set_dpi_aware() -> bool {
    *AWARENESS.get_or_init(|| {
        let aware = enable_per_monitor_v2();
        if aware {
            info!("Process is Per-Monitor V2 DPI aware");
        } else {
            warn!("Process is not DPI aware; absolute mouse positions may be scaled");
        }
        aware
    })
}

/// Outcome of [`set_dpi_aware`], if it has been called.
pub fn dpi_awareness() -> Option<bool> {
    AWARENESS.get().copied()
}

#[cfg(windows)]
fn enable_per_monitor_v2() -> bool {
    // Windows 10 1703+
    const DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2: isize = -4;

    #[link(name = "user32")]
    extern "system" {
        fn SetProcessDpiAwarenessContext(value: isize) -> i32;
    }

    unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) != 0 }
}

#[cfg(not(windows))]
fn enable_per_monitor_v2() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_is_recorded_once() {
        let first = set_dpi_aware();
        assert_eq!(dpi_awareness(), Some(first));
        assert_eq!(set_dpi_aware(), first);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_not_aware_off_windows() {
        assert!(!set_dpi_aware());
    }
}
