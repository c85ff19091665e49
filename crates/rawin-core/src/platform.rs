//! Collaborator traits implemented by the platform layer (`rawin-platform`).
//!
//! The core never calls the OS directly; everything native goes through these
//! seams so the engine can be driven by an in-memory platform in tests.

use crate::config::RegistrationOptions;
use crate::device::{DeviceClass, DeviceHandle, DeviceMetadata};
use crate::error::PlatformResult;
use crate::gateway::{Message, WindowId, WindowToken};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of retrieving one message on the pump thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// A message was retrieved and routed.
    Continue,
    /// The quit notification arrived; the loop must end.
    Quit,
}

/// Native message-only window and message queue primitives.
pub trait MessageWindowHost: Send + Sync + 'static {
    /// Register the process-wide window class. Must be idempotent and never
    /// undone.
    fn register_class(&self) -> PlatformResult<()>;

    /// Create a message-only window owned by the calling thread. `token` is
    /// stored with the window so the static window procedure can route its
    /// messages through [`crate::route`].
    fn create_message_window(&self, token: WindowToken) -> PlatformResult<WindowId>;

    /// Block until the next message for the calling thread is retrieved, then
    /// route it.
    fn pump_message(&self) -> PlatformResult<PumpStatus>;

    /// Post a notification to a window's queue. Callable from any thread.
    fn post_message(&self, window: WindowId, message: Message) -> PlatformResult<()>;

    /// Post the quit notification to the calling thread's queue.
    fn post_quit(&self);

    fn destroy_window(&self, window: WindowId);
}

/// Raw input registration, bound to the pump window's thread.
pub trait RawInputRegistrar: Send + Sync + 'static {
    fn register(
        &self,
        class: DeviceClass,
        window: WindowId,
        options: &RegistrationOptions,
    ) -> PlatformResult<()>;

    fn unregister(&self, class: DeviceClass) -> PlatformResult<()>;
}

/// Enumeration of attached devices and metadata lookup.
pub trait DeviceDirectory: Send + Sync + 'static {
    /// Handles of every currently attached raw input device.
    fn attached_devices(&self) -> HashSet<DeviceHandle>;

    /// Resolve descriptive metadata. Never fails: returns
    /// [`DeviceMetadata::empty`] when nothing can be resolved.
    fn resolve_metadata(&self, handle: DeviceHandle) -> DeviceMetadata;
}

/// Scan code / virtual key translation.
pub trait KeyMapper: Send + Sync + 'static {
    /// Map a scan code to a left/right-distinguishing virtual key
    /// (`MAPVK_VSC_TO_VK_EX`). Returns 0 when unmapped.
    fn scan_code_to_virtual_key(&self, scan_code: u16) -> u16;

    /// Map a virtual key to its scan code (`MAPVK_VK_TO_VSC`). Returns 0 when
    /// unmapped.
    fn virtual_key_to_scan_code(&self, virtual_key: u16) -> u16;
}

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Target coordinate spaces for absolute mouse motion.
pub trait ScreenMetrics: Send + Sync + 'static {
    fn primary_screen(&self) -> ScreenRect;
    fn virtual_desktop(&self) -> ScreenRect;
}

/// Everything a receiver needs from the platform.
pub trait Platform:
    MessageWindowHost + RawInputRegistrar + DeviceDirectory + KeyMapper + ScreenMetrics
{
}

impl<T> Platform for T where
    T: MessageWindowHost + RawInputRegistrar + DeviceDirectory + KeyMapper + ScreenMetrics
{
}
