//! `RAWINPUTDEVICE` flag selection.
#![cfg_attr(not(windows), allow(dead_code))]

use rawin_core::RegistrationOptions;

pub(crate) const RIDEV_REMOVE: u32 = 0x0000_0001;
pub(crate) const RIDEV_NOLEGACY: u32 = 0x0000_0030;
pub(crate) const RIDEV_INPUTSINK: u32 = 0x0000_0100;
pub(crate) const RIDEV_DEVNOTIFY: u32 = 0x0000_2000;

/// Flags for registering a device class with the given options.
pub(crate) fn register_flags(options: &RegistrationOptions) -> u32 {
    let mut flags = 0;
    if options.input_sink {
        flags |= RIDEV_INPUTSINK;
    }
    if options.no_legacy {
        flags |= RIDEV_NOLEGACY;
    }
    if options.device_notify {
        flags |= RIDEV_DEVNOTIFY;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = register_flags(&RegistrationOptions::default());
        assert_eq!(flags, RIDEV_INPUTSINK | RIDEV_DEVNOTIFY);
        assert_eq!(flags & RIDEV_REMOVE, 0);
    }

    #[test]
    fn test_all_flags() {
        let options = RegistrationOptions {
            input_sink: true,
            no_legacy: true,
            device_notify: true,
        };
        assert_eq!(register_flags(&options), 0x2130);
    }

    #[test]
    fn test_no_flags() {
        let options = RegistrationOptions {
            input_sink: false,
            no_legacy: false,
            device_notify: false,
        };
        assert_eq!(register_flags(&options), 0);
    }
}
