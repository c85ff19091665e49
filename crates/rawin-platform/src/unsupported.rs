//! Stand-in platform for targets without raw input.
//!
//! Every receiver built on it fails to start: window creation reports
//! [`PlatformError::NotImplemented`].

use crate::error::{PlatformError, PlatformResult};
use rawin_core::{
    DeviceClass, DeviceDirectory, DeviceHandle, DeviceMetadata, KeyMapper, Message,
    MessageWindowHost, PumpStatus, RawInputRegistrar, RegistrationOptions, ScreenMetrics,
    ScreenRect, WindowId, WindowToken,
};
use std::collections::HashSet;

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlatform;

impl MessageWindowHost for UnsupportedPlatform {
    fn register_class(&self) -> PlatformResult<()> {
        Ok(())
    }

    fn create_message_window(&self, _token: WindowToken) -> PlatformResult<WindowId> {
        Err(PlatformError::NotImplemented)
    }

    fn pump_message(&self) -> PlatformResult<PumpStatus> {
        Ok(PumpStatus::Quit)
    }

    fn post_message(&self, _window: WindowId, _message: Message) -> PlatformResult<()> {
        Err(PlatformError::NotImplemented)
    }

    fn post_quit(&self) {}

    fn destroy_window(&self, _window: WindowId) {}
}

impl RawInputRegistrar for UnsupportedPlatform {
    fn register(
        &self,
        _class: DeviceClass,
        _window: WindowId,
        _options: &RegistrationOptions,
    ) -> PlatformResult<()> {
        Err(PlatformError::NotImplemented)
    }

    fn unregister(&self, _class: DeviceClass) -> PlatformResult<()> {
        Err(PlatformError::NotImplemented)
    }
}

impl DeviceDirectory for UnsupportedPlatform {
    fn attached_devices(&self) -> HashSet<DeviceHandle> {
        HashSet::new()
    }

    fn resolve_metadata(&self, _handle: DeviceHandle) -> DeviceMetadata {
        DeviceMetadata::empty()
    }
}

impl KeyMapper for UnsupportedPlatform {
    fn scan_code_to_virtual_key(&self, _scan_code: u16) -> u16 {
        0
    }

    fn virtual_key_to_scan_code(&self, _virtual_key: u16) -> u16 {
        0
    }
}

impl ScreenMetrics for UnsupportedPlatform {
    fn primary_screen(&self) -> ScreenRect {
        ScreenRect::default()
    }

    fn virtual_desktop(&self) -> ScreenRect {
        ScreenRect::default()
    }
}
