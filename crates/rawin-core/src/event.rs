//! Typed input events delivered to subscribers, and the raw envelope they are
//! decoded from.

use crate::device::{DeviceClass, DeviceHandle, DeviceMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pressed/released transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeState {
    Pressed,
    Released,
}

impl EdgeState {
    pub fn is_pressed(self) -> bool {
        self == EdgeState::Pressed
    }
}

/// What a single mouse packet reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseOperation {
    Move,
    ButtonLeft,
    ButtonRight,
    ButtonMiddle,
    Button4,
    Button5,
    VerticalWheel,
    HorizontalWheel,
}

impl MouseOperation {
    pub fn is_button(self) -> bool {
        matches!(
            self,
            MouseOperation::ButtonLeft
                | MouseOperation::ButtonRight
                | MouseOperation::ButtonMiddle
                | MouseOperation::Button4
                | MouseOperation::Button5
        )
    }

    pub fn is_wheel(self) -> bool {
        matches!(self, MouseOperation::VerticalWheel | MouseOperation::HorizontalWheel)
    }
}

/// Coordinate space of a mouse event's `x`/`y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionMode {
    /// Motion deltas since the previous packet.
    Relative,
    /// Absolute position on the primary screen.
    AbsoluteScreen,
    /// Absolute position on the virtual desktop spanning all monitors.
    AbsoluteVirtualDesktop,
}

/// Logical key identity (Win32 virtual-key code), with left/right variants
/// already disambiguated for modifier keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const BACK: VirtualKey = VirtualKey(0x08);
    pub const TAB: VirtualKey = VirtualKey(0x09);
    pub const RETURN: VirtualKey = VirtualKey(0x0D);
    pub const SHIFT: VirtualKey = VirtualKey(0x10);
    pub const CONTROL: VirtualKey = VirtualKey(0x11);
    pub const MENU: VirtualKey = VirtualKey(0x12);
    pub const PAUSE: VirtualKey = VirtualKey(0x13);
    pub const CAPITAL: VirtualKey = VirtualKey(0x14);
    pub const ESCAPE: VirtualKey = VirtualKey(0x1B);
    pub const SPACE: VirtualKey = VirtualKey(0x20);
    pub const LEFT: VirtualKey = VirtualKey(0x25);
    pub const UP: VirtualKey = VirtualKey(0x26);
    pub const RIGHT: VirtualKey = VirtualKey(0x27);
    pub const DOWN: VirtualKey = VirtualKey(0x28);
    pub const DELETE: VirtualKey = VirtualKey(0x2E);
    pub const LEFT_WIN: VirtualKey = VirtualKey(0x5B);
    pub const RIGHT_WIN: VirtualKey = VirtualKey(0x5C);
    pub const NUM_LOCK: VirtualKey = VirtualKey(0x90);
    pub const SCROLL_LOCK: VirtualKey = VirtualKey(0x91);
    pub const LEFT_SHIFT: VirtualKey = VirtualKey(0xA0);
    pub const RIGHT_SHIFT: VirtualKey = VirtualKey(0xA1);
    pub const LEFT_CONTROL: VirtualKey = VirtualKey(0xA2);
    pub const RIGHT_CONTROL: VirtualKey = VirtualKey(0xA3);
    pub const LEFT_MENU: VirtualKey = VirtualKey(0xA4);
    pub const RIGHT_MENU: VirtualKey = VirtualKey(0xA5);
    /// Not a key; marks a keyboard buffer overrun.
    pub const OVERRUN: VirtualKey = VirtualKey(0xFF);

    /// Name of well-known keys.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            VirtualKey::BACK => "Back",
            VirtualKey::TAB => "Tab",
            VirtualKey::RETURN => "Return",
            VirtualKey::SHIFT => "Shift",
            VirtualKey::CONTROL => "Control",
            VirtualKey::MENU => "Menu",
            VirtualKey::PAUSE => "Pause",
            VirtualKey::CAPITAL => "CapsLock",
            VirtualKey::ESCAPE => "Escape",
            VirtualKey::SPACE => "Space",
            VirtualKey::LEFT => "Left",
            VirtualKey::UP => "Up",
            VirtualKey::RIGHT => "Right",
            VirtualKey::DOWN => "Down",
            VirtualKey::DELETE => "Delete",
            VirtualKey::LEFT_WIN => "LeftWin",
            VirtualKey::RIGHT_WIN => "RightWin",
            VirtualKey::NUM_LOCK => "NumLock",
            VirtualKey::SCROLL_LOCK => "ScrollLock",
            VirtualKey::LEFT_SHIFT => "LeftShift",
            VirtualKey::RIGHT_SHIFT => "RightShift",
            VirtualKey::LEFT_CONTROL => "LeftControl",
            VirtualKey::RIGHT_CONTROL => "RightControl",
            VirtualKey::LEFT_MENU => "LeftMenu",
            VirtualKey::RIGHT_MENU => "RightMenu",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "VirtualKey(0x{:02X})", self.0),
        }
    }
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Inline copy of a raw payload (`RAWMOUSE`/`RAWKEYBOARD`), so envelopes can be
/// built without a heap allocation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawPayload {
    bytes: [u8; RawPayload::CAPACITY],
    len: usize,
}

impl RawPayload {
    /// Large enough for the biggest payload the decoder reads (`RAWMOUSE`).
    pub const CAPACITY: usize = 24;

    /// Copy up to [`Self::CAPACITY`] bytes; anything beyond is never decoded.
    pub fn from_slice(data: &[u8]) -> Self {
        let len = data.len().min(Self::CAPACITY);
        let mut bytes = [0u8; Self::CAPACITY];
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPayload({:02X?})", self.as_bytes())
    }
}

/// One raw input notification, alive only for the duration of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEventEnvelope {
    pub device: DeviceHandle,
    pub class: DeviceClass,
    pub payload: RawPayload,
}

/// A decoded mouse packet.
#[derive(Debug, Clone)]
pub struct MouseEvent {
    pub device: DeviceHandle,
    pub metadata: Arc<DeviceMetadata>,
    pub operation: MouseOperation,
    /// Set for button operations only.
    pub edge: Option<EdgeState>,
    pub position_mode: PositionMode,
    pub x: i32,
    pub y: i32,
    /// Signed wheel delta for wheel operations, 0 otherwise.
    pub wheel_delta: i16,
}

/// A decoded keyboard packet.
#[derive(Debug, Clone)]
pub struct KeyboardEvent {
    pub device: DeviceHandle,
    pub metadata: Arc<DeviceMetadata>,
    pub virtual_key: VirtualKey,
    pub edge: EdgeState,
    /// Raw make code as reported by the device.
    pub scan_code: u16,
    /// Raw `RI_KEY_*` flags.
    pub flags: u16,
}

/// Either kind of decoded event.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Mouse(MouseEvent),
    Keyboard(KeyboardEvent),
}

impl fmt::Display for MouseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device = {}, operation = {:?}, edge = {:?}, mode = {:?}, x = {}, y = {}, wheel = {}, product = {}, manufacturer = {}",
            self.device,
            self.operation,
            self.edge,
            self.position_mode,
            self.x,
            self.y,
            self.wheel_delta,
            self.metadata.product_name,
            self.metadata.manufacturer,
        )
    }
}

impl fmt::Display for KeyboardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device = {}, key = {}, edge = {:?}, product = {}, manufacturer = {}",
            self.device,
            self.virtual_key,
            self.edge,
            self.metadata.product_name,
            self.metadata.manufacturer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_key_names() {
        assert_eq!(format!("{:?}", VirtualKey::RIGHT_CONTROL), "RightControl");
        assert_eq!(format!("{:?}", VirtualKey(0x41)), "VirtualKey(0x41)");
        assert_eq!(VirtualKey(0x41).name(), None);
    }

    #[test]
    fn test_payload_truncates_to_capacity() {
        let long = [7u8; 40];
        let payload = RawPayload::from_slice(&long);
        assert_eq!(payload.len(), RawPayload::CAPACITY);

        let short = RawPayload::from_slice(&[1, 2, 3]);
        assert_eq!(short.as_bytes(), &[1, 2, 3]);
        assert!(RawPayload::from_slice(&[]).is_empty());
    }

    #[test]
    fn test_operation_kinds() {
        assert!(MouseOperation::Button4.is_button());
        assert!(!MouseOperation::Move.is_button());
        assert!(MouseOperation::HorizontalWheel.is_wheel());
        assert!(!MouseOperation::ButtonLeft.is_wheel());
    }
}
