//! `RegisterRawInputDevices` calls.

use crate::error::{last_error, PlatformResult};
use crate::registration::{register_flags, RIDEV_REMOVE};
use rawin_core::{DeviceClass, RegistrationOptions, WindowId};
use tracing::debug;
use windows_sys::Win32::Foundation::HWND;
use windows_sys::Win32::UI::Input::{RegisterRawInputDevices, RAWINPUTDEVICE};

fn submit(device: &RAWINPUTDEVICE) -> PlatformResult<()> {
    let ok = unsafe {
        RegisterRawInputDevices(device, 1, std::mem::size_of::<RAWINPUTDEVICE>() as u32)
    };
    if ok == 0 {
        return Err(last_error("RegisterRawInputDevices"));
    }
    Ok(())
}

pub(super) fn register(
    class: DeviceClass,
    window: WindowId,
    options: &RegistrationOptions,
) -> PlatformResult<()> {
    let (page, usage) = class.usage();
    let flags = register_flags(options);
    submit(&RAWINPUTDEVICE {
        usUsagePage: page,
        usUsage: usage,
        dwFlags: flags,
        hwndTarget: window.0 as HWND,
    })?;
    debug!(?class, flags, "Raw input registered");
    Ok(())
}

/// Removal must name no target window.
pub(super) fn unregister(class: DeviceClass) -> PlatformResult<()> {
    let (page, usage) = class.usage();
    submit(&RAWINPUTDEVICE {
        usUsagePage: page,
        usUsage: usage,
        dwFlags: RIDEV_REMOVE,
        hwndTarget: std::ptr::null_mut(),
    })?;
    debug!(?class, "Raw input unregistered");
    Ok(())
}
