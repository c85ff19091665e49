//! Win32 implementation of the core collaborator traits.

mod devices;
mod keys;
mod metrics;
mod registration;
mod window;

use crate::error::PlatformResult;
use rawin_core::{
    DeviceClass, DeviceDirectory, DeviceHandle, DeviceMetadata, KeyMapper, Message,
    MessageWindowHost, PumpStatus, RawInputRegistrar, RegistrationOptions, ScreenMetrics,
    ScreenRect, WindowId, WindowToken,
};
use std::collections::HashSet;

/// The native platform. Stateless: every window, registration and lookup goes
/// straight to the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPlatform {
    _private: (),
}

impl WindowsPlatform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageWindowHost for WindowsPlatform {
    fn register_class(&self) -> PlatformResult<()> {
        window::register_class()
    }

    fn create_message_window(&self, token: WindowToken) -> PlatformResult<WindowId> {
        window::create_message_window(token)
    }

    fn pump_message(&self) -> PlatformResult<PumpStatus> {
        window::pump_message()
    }

    fn post_message(&self, window: WindowId, message: Message) -> PlatformResult<()> {
        window::post_message(window, message)
    }

    fn post_quit(&self) {
        window::post_quit()
    }

    fn destroy_window(&self, window: WindowId) {
        window::destroy_window(window)
    }
}

impl RawInputRegistrar for WindowsPlatform {
    fn register(
        &self,
        class: DeviceClass,
        window: WindowId,
        options: &RegistrationOptions,
    ) -> PlatformResult<()> {
        registration::register(class, window, options)
    }

    fn unregister(&self, class: DeviceClass) -> PlatformResult<()> {
        registration::unregister(class)
    }
}

impl DeviceDirectory for WindowsPlatform {
    fn attached_devices(&self) -> HashSet<DeviceHandle> {
        devices::attached_devices()
    }

    fn resolve_metadata(&self, handle: DeviceHandle) -> DeviceMetadata {
        devices::resolve_metadata(handle)
    }
}

impl KeyMapper for WindowsPlatform {
    fn scan_code_to_virtual_key(&self, scan_code: u16) -> u16 {
        keys::scan_code_to_virtual_key(scan_code)
    }

    fn virtual_key_to_scan_code(&self, virtual_key: u16) -> u16 {
        keys::virtual_key_to_scan_code(virtual_key)
    }
}

impl ScreenMetrics for WindowsPlatform {
    fn primary_screen(&self) -> ScreenRect {
        metrics::primary_screen()
    }

    fn virtual_desktop(&self) -> ScreenRect {
        metrics::virtual_desktop()
    }
}
