//! In-memory platform for driving receivers without an OS message queue.
//!
//! Every window gets its own queue bound to the thread that created it, like a
//! native message-only window. Tests inject messages, attach and detach
//! devices, and inspect the registration calls the receiver made.

use crate::config::RegistrationOptions;
use crate::decoder::{KeyboardPayload, MousePayload};
use crate::device::{DeviceClass, DeviceHandle, DeviceMetadata, DevicePathInfo};
use crate::error::{PlatformError, PlatformResult, ReceiverResult};
use crate::event::{RawEventEnvelope, RawPayload};
use crate::gateway::{self, Message, WindowId, WindowToken};
use crate::platform::{
    DeviceDirectory, KeyMapper, MessageWindowHost, PumpStatus, RawInputRegistrar, ScreenMetrics,
    ScreenRect,
};
use crate::pump::PumpHost;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

type Queue = (Sender<(WindowId, Message)>, Receiver<(WindowId, Message)>);

/// A registration call observed by [`FakePlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationCall {
    Register {
        class: DeviceClass,
        window: WindowId,
        options: RegistrationOptions,
    },
    Unregister {
        class: DeviceClass,
    },
}

struct FakeWindow {
    token: WindowToken,
    queue: Sender<(WindowId, Message)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FakePlatform {
    queues: Mutex<HashMap<ThreadId, Queue>>,
    windows: Mutex<HashMap<WindowId, FakeWindow>>,
    last_window: Mutex<Option<WindowId>>,
    next_window: AtomicUsize,
    calls: Mutex<Vec<RegistrationCall>>,
    devices: Mutex<BTreeMap<DeviceHandle, DeviceMetadata>>,
    lookups: AtomicUsize,
    fail_window_creation: AtomicBool,
    fail_registration: AtomicBool,
    primary: ScreenRect,
    virtual_desktop: ScreenRect,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            last_window: Mutex::new(None),
            next_window: AtomicUsize::new(0x1000),
            calls: Mutex::new(Vec::new()),
            devices: Mutex::new(BTreeMap::new()),
            lookups: AtomicUsize::new(0),
            fail_window_creation: AtomicBool::new(false),
            fail_registration: AtomicBool::new(false),
            primary: ScreenRect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
            virtual_desktop: ScreenRect {
                x: -1280,
                y: 0,
                width: 3200,
                height: 1080,
            },
        }
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn thread_queue(&self) -> Queue {
        lock(&self.queues)
            .entry(thread::current().id())
            .or_insert_with(unbounded)
            .clone()
    }

    /// Make every following window creation fail.
    pub fn fail_window_creation(&self, fail: bool) {
        self.fail_window_creation.store(fail, Ordering::SeqCst);
    }

    /// Make every following registration call fail.
    pub fn fail_registration(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    /// Attach a device and return its handle.
    pub fn attach(&self, handle: usize, product_name: &str, manufacturer: &str) -> DeviceHandle {
        let handle = DeviceHandle(handle);
        let path = format!(
            r"\\?\HID#VID_046D&PID_{:04X}#7&1&0&0000#{{378de44c-56ef-11d1-bc8c-00a0c91405dd}}",
            handle.0 & 0xFFFF
        );
        let metadata = DeviceMetadata {
            handle,
            friendly_name: format!("{product_name} (HID)"),
            manufacturer: manufacturer.to_string(),
            product_name: product_name.to_string(),
            path: DevicePathInfo::parse(&path),
        };
        lock(&self.devices).insert(handle, metadata);
        handle
    }

    /// Remove a device. Does not notify any window; see [`Self::device_change`].
    pub fn detach(&self, handle: DeviceHandle) -> bool {
        lock(&self.devices).remove(&handle).is_some()
    }

    /// Number of metadata lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn registration_calls(&self) -> Vec<RegistrationCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_registration_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Most recently created window.
    pub fn last_window(&self) -> Option<WindowId> {
        *lock(&self.last_window)
    }

    pub fn window_count(&self) -> usize {
        lock(&self.windows).len()
    }

    /// Post `message` to the most recently created window.
    pub fn inject(&self, message: Message) -> PlatformResult<()> {
        let window = self
            .last_window()
            .ok_or_else(|| PlatformError::InvalidArgument("no window created".into()))?;
        self.post_message(window, message)
    }

    pub fn inject_keyboard(
        &self,
        device: DeviceHandle,
        make_code: u16,
        flags: u16,
        virtual_key: u16,
    ) -> PlatformResult<()> {
        self.inject(keyboard_input(device, make_code, flags, virtual_key))
    }

    pub fn inject_mouse(&self, device: DeviceHandle, payload: MousePayload) -> PlatformResult<()> {
        self.inject(mouse_input(device, payload))
    }

    pub fn device_change(&self) -> PlatformResult<()> {
        self.inject(Message::DeviceChange)
    }
}

/// A keyboard input message with the given `RAWKEYBOARD` fields.
pub fn keyboard_input(device: DeviceHandle, make_code: u16, flags: u16, virtual_key: u16) -> Message {
    let payload = KeyboardPayload {
        make_code,
        flags,
        reserved: 0,
        virtual_key,
        message: if flags & 0x01 != 0 { 0x101 } else { 0x100 },
        extra_information: 0,
    };
    Message::Input(RawEventEnvelope {
        device,
        class: DeviceClass::Keyboard,
        payload: RawPayload::from_slice(&payload.to_bytes()),
    })
}

pub fn mouse_input(device: DeviceHandle, payload: MousePayload) -> Message {
    Message::Input(RawEventEnvelope {
        device,
        class: DeviceClass::Mouse,
        payload: RawPayload::from_slice(&payload.to_bytes()),
    })
}

/// Wait until everything posted to `host`'s window so far has been handled.
///
/// Two round trips: the first one may be drained by a wake that was already
/// queued ahead of earlier messages.
pub fn flush<P: MessageWindowHost>(host: &PumpHost<P>) -> ReceiverResult<()> {
    host.invoke(|_| Ok(()))?.wait()?;
    host.invoke(|_| Ok(()))?.wait()
}

impl MessageWindowHost for FakePlatform {
    fn register_class(&self) -> PlatformResult<()> {
        Ok(())
    }

    fn create_message_window(&self, token: WindowToken) -> PlatformResult<WindowId> {
        if self.fail_window_creation.load(Ordering::SeqCst) {
            return Err(PlatformError::Win32 {
                call: "CreateWindowExW",
                code: 1407,
            });
        }
        let window = WindowId(self.next_window.fetch_add(1, Ordering::SeqCst));
        let (queue, _) = self.thread_queue();
        lock(&self.windows).insert(window, FakeWindow { token, queue });
        *lock(&self.last_window) = Some(window);

        gateway::route(token, window, &Message::Create);
        Ok(window)
    }

    fn pump_message(&self) -> PlatformResult<PumpStatus> {
        let (_, queue) = self.thread_queue();
        let (window, message) = queue.recv().map_err(|_| PlatformError::Win32 {
            call: "GetMessageW",
            code: 1400,
        })?;
        if message == Message::Quit {
            return Ok(PumpStatus::Quit);
        }
        let token = lock(&self.windows).get(&window).map(|w| w.token);
        if let Some(token) = token {
            gateway::route(token, window, &message);
        }
        Ok(PumpStatus::Continue)
    }

    fn post_message(&self, window: WindowId, message: Message) -> PlatformResult<()> {
        let windows = lock(&self.windows);
        let target = windows.get(&window).ok_or(PlatformError::Win32 {
            call: "PostMessageW",
            code: 1400,
        })?;
        target
            .queue
            .send((window, message))
            .map_err(|_| PlatformError::Win32 {
                call: "PostMessageW",
                code: 1400,
            })
    }

    fn post_quit(&self) {
        let (queue, _) = self.thread_queue();
        let _ = queue.send((WindowId(0), Message::Quit));
    }

    fn destroy_window(&self, window: WindowId) {
        let removed = lock(&self.windows).remove(&window);
        if let Some(removed) = removed {
            gateway::route(removed.token, window, &Message::Destroy);
        }
    }
}

impl RawInputRegistrar for FakePlatform {
    fn register(
        &self,
        class: DeviceClass,
        window: WindowId,
        options: &RegistrationOptions,
    ) -> PlatformResult<()> {
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(PlatformError::Win32 {
                call: "RegisterRawInputDevices",
                code: 87,
            });
        }
        lock(&self.calls).push(RegistrationCall::Register {
            class,
            window,
            options: *options,
        });
        Ok(())
    }

    fn unregister(&self, class: DeviceClass) -> PlatformResult<()> {
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(PlatformError::Win32 {
                call: "RegisterRawInputDevices",
                code: 87,
            });
        }
        lock(&self.calls).push(RegistrationCall::Unregister { class });
        Ok(())
    }
}

impl DeviceDirectory for FakePlatform {
    fn attached_devices(&self) -> HashSet<DeviceHandle> {
        lock(&self.devices).keys().copied().collect()
    }

    fn resolve_metadata(&self, handle: DeviceHandle) -> DeviceMetadata {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        lock(&self.devices)
            .get(&handle)
            .cloned()
            .unwrap_or_default()
    }
}

impl KeyMapper for FakePlatform {
    fn scan_code_to_virtual_key(&self, scan_code: u16) -> u16 {
        match scan_code {
            0x2A => 0xA0,
            0x36 => 0xA1,
            0x1D => 0xA2,
            0x38 => 0xA4,
            _ => 0,
        }
    }

    fn virtual_key_to_scan_code(&self, virtual_key: u16) -> u16 {
        match virtual_key {
            0x90 => 0x45,
            0xA0 => 0x2A,
            0xA1 => 0x36,
            _ => 0,
        }
    }
}

impl ScreenMetrics for FakePlatform {
    fn primary_screen(&self) -> ScreenRect {
        self.primary
    }

    fn virtual_desktop(&self) -> ScreenRect {
        self.virtual_desktop
    }
}
