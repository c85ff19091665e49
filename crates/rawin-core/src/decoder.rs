//! Decoding of raw mouse and keyboard payloads into typed events.
//!
//! Payloads use the little-endian `RAWMOUSE` / `RAWKEYBOARD` layouts. Anything
//! that cannot be decoded is dropped with a debug log; the decoder never fails.

use crate::device::{DeviceClass, DeviceHandle, DeviceMetadata};
use crate::error::ScaleError;
use crate::event::{
    EdgeState, InputEvent, KeyboardEvent, MouseEvent, MouseOperation, PositionMode,
    RawEventEnvelope, VirtualKey,
};
use crate::platform::{KeyMapper, ScreenMetrics, ScreenRect};
use std::sync::Arc;
use tracing::debug;

/// Largest normalized absolute coordinate.
pub const ABSOLUTE_MAX: i64 = 65535;

// RAWKEYBOARD.Flags
pub const RI_KEY_BREAK: u16 = 0x01;
pub const RI_KEY_E0: u16 = 0x02;
pub const RI_KEY_E1: u16 = 0x04;

/// Make code reported alongside an overrun.
pub const KEYBOARD_OVERRUN_MAKE_CODE: u16 = 0xFF;

// RAWMOUSE.usFlags
pub const MOUSE_MOVE_ABSOLUTE: u16 = 0x01;
pub const MOUSE_VIRTUAL_DESKTOP: u16 = 0x02;

// RAWMOUSE.usButtonFlags
pub const RI_MOUSE_LEFT_BUTTON_DOWN: u16 = 0x0001;
pub const RI_MOUSE_LEFT_BUTTON_UP: u16 = 0x0002;
pub const RI_MOUSE_RIGHT_BUTTON_DOWN: u16 = 0x0004;
pub const RI_MOUSE_RIGHT_BUTTON_UP: u16 = 0x0008;
pub const RI_MOUSE_MIDDLE_BUTTON_DOWN: u16 = 0x0010;
pub const RI_MOUSE_MIDDLE_BUTTON_UP: u16 = 0x0020;
pub const RI_MOUSE_BUTTON_4_DOWN: u16 = 0x0040;
pub const RI_MOUSE_BUTTON_4_UP: u16 = 0x0080;
pub const RI_MOUSE_BUTTON_5_DOWN: u16 = 0x0100;
pub const RI_MOUSE_BUTTON_5_UP: u16 = 0x0200;
pub const RI_MOUSE_WHEEL: u16 = 0x0400;
pub const RI_MOUSE_HWHEEL: u16 = 0x0800;

/// Button flags in the order they win when several are set in one packet.
const BUTTON_PRECEDENCE: [(u16, MouseOperation, EdgeState); 10] = [
    (RI_MOUSE_LEFT_BUTTON_DOWN, MouseOperation::ButtonLeft, EdgeState::Pressed),
    (RI_MOUSE_LEFT_BUTTON_UP, MouseOperation::ButtonLeft, EdgeState::Released),
    (RI_MOUSE_RIGHT_BUTTON_DOWN, MouseOperation::ButtonRight, EdgeState::Pressed),
    (RI_MOUSE_RIGHT_BUTTON_UP, MouseOperation::ButtonRight, EdgeState::Released),
    (RI_MOUSE_MIDDLE_BUTTON_DOWN, MouseOperation::ButtonMiddle, EdgeState::Pressed),
    (RI_MOUSE_MIDDLE_BUTTON_UP, MouseOperation::ButtonMiddle, EdgeState::Released),
    (RI_MOUSE_BUTTON_4_DOWN, MouseOperation::Button4, EdgeState::Pressed),
    (RI_MOUSE_BUTTON_4_UP, MouseOperation::Button4, EdgeState::Released),
    (RI_MOUSE_BUTTON_5_DOWN, MouseOperation::Button5, EdgeState::Pressed),
    (RI_MOUSE_BUTTON_5_UP, MouseOperation::Button5, EdgeState::Released),
];

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    read_u32(bytes, offset).map(|v| v as i32)
}

/// `RAWKEYBOARD` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardPayload {
    pub make_code: u16,
    pub flags: u16,
    pub reserved: u16,
    pub virtual_key: u16,
    pub message: u32,
    pub extra_information: u32,
}

impl KeyboardPayload {
    pub const SIZE: usize = 16;

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            make_code: read_u16(bytes, 0)?,
            flags: read_u16(bytes, 2)?,
            reserved: read_u16(bytes, 4)?,
            virtual_key: read_u16(bytes, 6)?,
            message: read_u32(bytes, 8)?,
            extra_information: read_u32(bytes, 12)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.make_code.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.flags.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.reserved.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.virtual_key.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.message.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.extra_information.to_le_bytes());
        bytes
    }

    /// Whether this packet signals a keyboard buffer overrun.
    pub fn is_overrun(&self) -> bool {
        self.virtual_key == VirtualKey::OVERRUN.0 || self.make_code == KEYBOARD_OVERRUN_MAKE_CODE
    }
}

/// `RAWMOUSE` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MousePayload {
    pub flags: u16,
    pub button_flags: u16,
    pub button_data: u16,
    pub raw_buttons: u32,
    pub last_x: i32,
    pub last_y: i32,
    pub extra_information: u32,
}

impl MousePayload {
    pub const SIZE: usize = 24;

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            flags: read_u16(bytes, 0)?,
            button_flags: read_u16(bytes, 4)?,
            button_data: read_u16(bytes, 6)?,
            raw_buttons: read_u32(bytes, 8)?,
            last_x: read_i32(bytes, 12)?,
            last_y: read_i32(bytes, 16)?,
            extra_information: read_u32(bytes, 20)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.flags.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.button_flags.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.button_data.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.raw_buttons.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.last_x.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.last_y.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.extra_information.to_le_bytes());
        bytes
    }
}

/// Decode one envelope. `resolve` is only called once the payload is known to
/// produce an event.
pub fn decode<R, K, S>(
    envelope: &RawEventEnvelope,
    resolve: R,
    keys: &K,
    screens: &S,
) -> Option<InputEvent>
where
    R: FnOnce(DeviceHandle) -> Arc<DeviceMetadata>,
    K: KeyMapper + ?Sized,
    S: ScreenMetrics + ?Sized,
{
    match envelope.class {
        DeviceClass::Keyboard => {
            decode_keyboard(envelope, resolve, keys).map(InputEvent::Keyboard)
        }
        DeviceClass::Mouse => decode_mouse(envelope, resolve, screens).map(InputEvent::Mouse),
    }
}

pub fn decode_keyboard<R, K>(
    envelope: &RawEventEnvelope,
    resolve: R,
    keys: &K,
) -> Option<KeyboardEvent>
where
    R: FnOnce(DeviceHandle) -> Arc<DeviceMetadata>,
    K: KeyMapper + ?Sized,
{
    let Some(payload) = KeyboardPayload::parse(envelope.payload.as_bytes()) else {
        debug!(device = %envelope.device, len = envelope.payload.len(), "Dropping truncated keyboard payload");
        return None;
    };
    if payload.is_overrun() {
        debug!(device = %envelope.device, "Dropping keyboard overrun");
        return None;
    }

    let edge = if payload.flags & RI_KEY_BREAK != 0 {
        EdgeState::Released
    } else {
        EdgeState::Pressed
    };

    Some(KeyboardEvent {
        device: envelope.device,
        metadata: resolve(envelope.device),
        virtual_key: true_virtual_key(&payload, keys),
        edge,
        scan_code: payload.make_code,
        flags: payload.flags,
    })
}

/// Disambiguate generic modifier keys into their left/right variants.
pub fn true_virtual_key<K>(payload: &KeyboardPayload, keys: &K) -> VirtualKey
where
    K: KeyMapper + ?Sized,
{
    let extended = payload.flags & RI_KEY_E0 != 0;
    match VirtualKey(payload.virtual_key) {
        VirtualKey::SHIFT => VirtualKey(keys.scan_code_to_virtual_key(payload.make_code)),
        VirtualKey::CONTROL if extended => VirtualKey::RIGHT_CONTROL,
        VirtualKey::CONTROL => VirtualKey::LEFT_CONTROL,
        VirtualKey::MENU if extended => VirtualKey::RIGHT_MENU,
        VirtualKey::MENU => VirtualKey::LEFT_MENU,
        VirtualKey::NUM_LOCK => {
            VirtualKey(keys.virtual_key_to_scan_code(VirtualKey::NUM_LOCK.0) | 0x100)
        }
        other => other,
    }
}

pub fn decode_mouse<R, S>(envelope: &RawEventEnvelope, resolve: R, screens: &S) -> Option<MouseEvent>
where
    R: FnOnce(DeviceHandle) -> Arc<DeviceMetadata>,
    S: ScreenMetrics + ?Sized,
{
    let Some(payload) = MousePayload::parse(envelope.payload.as_bytes()) else {
        debug!(device = %envelope.device, len = envelope.payload.len(), "Dropping truncated mouse payload");
        return None;
    };

    let (operation, edge, wheel_delta) = classify_buttons(&payload);

    let (position_mode, x, y) = match position(&payload, screens) {
        Ok(position) => position,
        Err(err) => {
            debug!(device = %envelope.device, error = %err, "Dropping mouse packet");
            return None;
        }
    };

    Some(MouseEvent {
        device: envelope.device,
        metadata: resolve(envelope.device),
        operation,
        edge,
        position_mode,
        x,
        y,
        wheel_delta,
    })
}

/// Pick the single operation a packet reports.
pub fn classify_buttons(payload: &MousePayload) -> (MouseOperation, Option<EdgeState>, i16) {
    let flags = payload.button_flags;
    for (flag, operation, edge) in BUTTON_PRECEDENCE {
        if flags & flag != 0 {
            return (operation, Some(edge), 0);
        }
    }
    let delta = payload.button_data as i16;
    if flags & RI_MOUSE_WHEEL != 0 {
        (MouseOperation::VerticalWheel, None, delta)
    } else if flags & RI_MOUSE_HWHEEL != 0 {
        (MouseOperation::HorizontalWheel, None, delta)
    } else {
        (MouseOperation::Move, None, 0)
    }
}

fn position<S>(payload: &MousePayload, screens: &S) -> Result<(PositionMode, i32, i32), ScaleError>
where
    S: ScreenMetrics + ?Sized,
{
    if payload.flags & MOUSE_MOVE_ABSOLUTE == 0 {
        return Ok((PositionMode::Relative, payload.last_x, payload.last_y));
    }
    let (mode, rect) = if payload.flags & MOUSE_VIRTUAL_DESKTOP != 0 {
        (PositionMode::AbsoluteVirtualDesktop, screens.virtual_desktop())
    } else {
        (PositionMode::AbsoluteScreen, screens.primary_screen())
    };
    let (x, y) = scale_point(payload.last_x, payload.last_y, rect)?;
    Ok((mode, x, y))
}

pub fn scale_point(raw_x: i32, raw_y: i32, rect: ScreenRect) -> Result<(i32, i32), ScaleError> {
    Ok((
        scale_absolute(raw_x, rect.width, rect.x)?,
        scale_absolute(raw_y, rect.height, rect.y)?,
    ))
}

/// Map a normalized coordinate in `0..=65535` onto `extent` pixels starting
/// at `origin`, rounding half away from zero.
pub fn scale_absolute(raw: i32, extent: i32, origin: i32) -> Result<i32, ScaleError> {
    let overflow = ScaleError::Overflow { raw, extent, origin };
    let scaled = mul_div_round(i64::from(raw), i64::from(extent), ABSOLUTE_MAX);
    let scaled = i32::try_from(scaled).map_err(|_| overflow)?;
    scaled.checked_add(origin).ok_or(overflow)
}

fn mul_div_round(value: i64, numerator: i64, denominator: i64) -> i64 {
    let product = value * numerator;
    let half = denominator / 2;
    if product >= 0 {
        (product + half) / denominator
    } else {
        (product - half) / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawPayload;

    struct Keys;

    impl KeyMapper for Keys {
        fn scan_code_to_virtual_key(&self, scan_code: u16) -> u16 {
            match scan_code {
                0x2A => 0xA0,
                0x36 => 0xA1,
                _ => 0,
            }
        }

        fn virtual_key_to_scan_code(&self, virtual_key: u16) -> u16 {
            if virtual_key == 0x90 {
                0x45
            } else {
                0
            }
        }
    }

    struct Screens;

    impl ScreenMetrics for Screens {
        fn primary_screen(&self) -> ScreenRect {
            ScreenRect { x: 0, y: 0, width: 1920, height: 1080 }
        }

        fn virtual_desktop(&self) -> ScreenRect {
            ScreenRect { x: -1280, y: 0, width: 3200, height: 1080 }
        }
    }

    fn metadata(handle: DeviceHandle) -> Arc<DeviceMetadata> {
        Arc::new(DeviceMetadata {
            handle,
            product_name: "Test".into(),
            ..DeviceMetadata::empty()
        })
    }

    fn key_envelope(make_code: u16, flags: u16, virtual_key: u16) -> RawEventEnvelope {
        let payload = KeyboardPayload {
            make_code,
            flags,
            reserved: 0,
            virtual_key,
            message: 0x100,
            extra_information: 0,
        };
        RawEventEnvelope {
            device: DeviceHandle(1),
            class: DeviceClass::Keyboard,
            payload: RawPayload::from_slice(&payload.to_bytes()),
        }
    }

    fn mouse_envelope(payload: MousePayload) -> RawEventEnvelope {
        RawEventEnvelope {
            device: DeviceHandle(2),
            class: DeviceClass::Mouse,
            payload: RawPayload::from_slice(&payload.to_bytes()),
        }
    }

    fn key(make_code: u16, flags: u16, virtual_key: u16) -> Option<KeyboardEvent> {
        decode_keyboard(&key_envelope(make_code, flags, virtual_key), metadata, &Keys)
    }

    fn mouse(payload: MousePayload) -> Option<MouseEvent> {
        decode_mouse(&mouse_envelope(payload), metadata, &Screens)
    }

    fn buttons(button_flags: u16) -> MousePayload {
        MousePayload {
            button_flags,
            ..MousePayload::default()
        }
    }

    #[test]
    fn test_key_press_and_release() {
        let pressed = key(0x1E, 0, 0x41).unwrap();
        assert_eq!(pressed.virtual_key, VirtualKey(0x41));
        assert_eq!(pressed.edge, EdgeState::Pressed);
        assert_eq!(pressed.scan_code, 0x1E);
        assert_eq!(pressed.metadata.product_name, "Test");

        let released = key(0x1E, RI_KEY_BREAK, 0x41).unwrap();
        assert_eq!(released.edge, EdgeState::Released);
    }

    #[test]
    fn test_modifier_keys_are_disambiguated() {
        assert_eq!(key(0x1D, 0, 0x11).unwrap().virtual_key, VirtualKey::LEFT_CONTROL);
        assert_eq!(key(0x1D, RI_KEY_E0, 0x11).unwrap().virtual_key, VirtualKey::RIGHT_CONTROL);
        assert_eq!(key(0x38, 0, 0x12).unwrap().virtual_key, VirtualKey::LEFT_MENU);
        assert_eq!(
            key(0x38, RI_KEY_E0 | RI_KEY_BREAK, 0x12).unwrap().virtual_key,
            VirtualKey::RIGHT_MENU
        );
        assert_eq!(key(0x2A, 0, 0x10).unwrap().virtual_key, VirtualKey::LEFT_SHIFT);
        assert_eq!(key(0x36, 0, 0x10).unwrap().virtual_key, VirtualKey::RIGHT_SHIFT);
    }

    #[test]
    fn test_num_lock_uses_extended_scan_code() {
        assert_eq!(key(0x45, 0, 0x90).unwrap().virtual_key, VirtualKey(0x145));
    }

    #[test]
    fn test_overrun_is_dropped_without_lookup() {
        let envelope = key_envelope(0x00, 0, 0xFF);
        let event = decode_keyboard(&envelope, |_| panic!("metadata must not be resolved"), &Keys);
        assert!(event.is_none());
        assert!(key(0xFF, 0, 0x41).is_none());
    }

    #[test]
    fn test_truncated_payload_is_dropped() {
        let envelope = RawEventEnvelope {
            device: DeviceHandle(1),
            class: DeviceClass::Keyboard,
            payload: RawPayload::from_slice(&[0x1E, 0x00, 0x00]),
        };
        assert!(decode(&envelope, metadata, &Keys, &Screens).is_none());

        let envelope = RawEventEnvelope {
            device: DeviceHandle(2),
            class: DeviceClass::Mouse,
            payload: RawPayload::from_slice(&[0u8; 16]),
        };
        assert!(decode(&envelope, metadata, &Keys, &Screens).is_none());
    }

    #[test]
    fn test_single_button_flags() {
        let cases = [
            (RI_MOUSE_LEFT_BUTTON_DOWN, MouseOperation::ButtonLeft, EdgeState::Pressed),
            (RI_MOUSE_LEFT_BUTTON_UP, MouseOperation::ButtonLeft, EdgeState::Released),
            (RI_MOUSE_RIGHT_BUTTON_DOWN, MouseOperation::ButtonRight, EdgeState::Pressed),
            (RI_MOUSE_RIGHT_BUTTON_UP, MouseOperation::ButtonRight, EdgeState::Released),
            (RI_MOUSE_MIDDLE_BUTTON_DOWN, MouseOperation::ButtonMiddle, EdgeState::Pressed),
            (RI_MOUSE_MIDDLE_BUTTON_UP, MouseOperation::ButtonMiddle, EdgeState::Released),
            (RI_MOUSE_BUTTON_4_DOWN, MouseOperation::Button4, EdgeState::Pressed),
            (RI_MOUSE_BUTTON_4_UP, MouseOperation::Button4, EdgeState::Released),
            (RI_MOUSE_BUTTON_5_DOWN, MouseOperation::Button5, EdgeState::Pressed),
            (RI_MOUSE_BUTTON_5_UP, MouseOperation::Button5, EdgeState::Released),
        ];
        for (flag, operation, edge) in cases {
            let event = mouse(buttons(flag)).unwrap();
            assert_eq!(event.operation, operation, "flag {flag:#06x}");
            assert_eq!(event.edge, Some(edge), "flag {flag:#06x}");
            assert_eq!(event.wheel_delta, 0);
        }
    }

    #[test]
    fn test_button_precedence() {
        let event = mouse(buttons(RI_MOUSE_RIGHT_BUTTON_DOWN | RI_MOUSE_LEFT_BUTTON_UP)).unwrap();
        assert_eq!(event.operation, MouseOperation::ButtonLeft);
        assert_eq!(event.edge, Some(EdgeState::Released));

        let event = mouse(buttons(RI_MOUSE_BUTTON_5_UP | RI_MOUSE_MIDDLE_BUTTON_DOWN)).unwrap();
        assert_eq!(event.operation, MouseOperation::ButtonMiddle);

        let mut payload = buttons(RI_MOUSE_WHEEL | RI_MOUSE_BUTTON_4_DOWN);
        payload.button_data = 120;
        let event = mouse(payload).unwrap();
        assert_eq!(event.operation, MouseOperation::Button4);
        assert_eq!(event.wheel_delta, 0);
    }

    #[test]
    fn test_wheel_delta_is_signed() {
        let mut payload = buttons(RI_MOUSE_WHEEL);
        payload.button_data = (-120i16) as u16;
        let event = mouse(payload).unwrap();
        assert_eq!(event.operation, MouseOperation::VerticalWheel);
        assert_eq!(event.edge, None);
        assert_eq!(event.wheel_delta, -120);

        let mut payload = buttons(RI_MOUSE_HWHEEL | RI_MOUSE_WHEEL);
        payload.button_data = 240;
        assert_eq!(mouse(payload).unwrap().operation, MouseOperation::VerticalWheel);

        let mut payload = buttons(RI_MOUSE_HWHEEL);
        payload.button_data = 240;
        let event = mouse(payload).unwrap();
        assert_eq!(event.operation, MouseOperation::HorizontalWheel);
        assert_eq!(event.wheel_delta, 240);
    }

    #[test]
    fn test_relative_move() {
        let event = mouse(MousePayload {
            last_x: -5,
            last_y: 12,
            ..MousePayload::default()
        })
        .unwrap();
        assert_eq!(event.operation, MouseOperation::Move);
        assert_eq!(event.edge, None);
        assert_eq!(event.position_mode, PositionMode::Relative);
        assert_eq!((event.x, event.y), (-5, 12));
    }

    #[test]
    fn test_absolute_move_scales_to_primary_screen() {
        let event = mouse(MousePayload {
            flags: MOUSE_MOVE_ABSOLUTE,
            last_x: 32768,
            last_y: 65535,
            ..MousePayload::default()
        })
        .unwrap();
        assert_eq!(event.position_mode, PositionMode::AbsoluteScreen);
        assert_eq!((event.x, event.y), (960, 1080));
    }

    #[test]
    fn test_absolute_move_on_virtual_desktop() {
        let event = mouse(MousePayload {
            flags: MOUSE_MOVE_ABSOLUTE | MOUSE_VIRTUAL_DESKTOP,
            last_x: 0,
            last_y: 0,
            ..MousePayload::default()
        })
        .unwrap();
        assert_eq!(event.position_mode, PositionMode::AbsoluteVirtualDesktop);
        assert_eq!((event.x, event.y), (-1280, 0));
    }

    #[test]
    fn test_scale_absolute() {
        assert_eq!(scale_absolute(0, 1920, 0), Ok(0));
        assert_eq!(scale_absolute(65535, 1920, 0), Ok(1920));
        assert_eq!(scale_absolute(65535, 3200, -1280), Ok(1920));
        // 32768 * 1920 / 65535 = 960.01
        assert_eq!(scale_absolute(32768, 1920, 0), Ok(960));
        // 32768 / 65535 is just over one half
        assert_eq!(scale_absolute(1, 32768, 0), Ok(1));
        assert_eq!(scale_absolute(-1, 32768, 0), Ok(-1));
    }

    #[test]
    fn test_scale_absolute_overflow() {
        assert!(matches!(
            scale_absolute(65535, i32::MAX, 1),
            Err(ScaleError::Overflow { .. })
        ));
        assert!(matches!(
            scale_absolute(i32::MAX, i32::MAX, 0),
            Err(ScaleError::Overflow { .. })
        ));

        struct Wide;

        impl ScreenMetrics for Wide {
            fn primary_screen(&self) -> ScreenRect {
                ScreenRect { x: 1, y: 0, width: i32::MAX, height: 1080 }
            }

            fn virtual_desktop(&self) -> ScreenRect {
                self.primary_screen()
            }
        }

        let dropped = decode_mouse(
            &mouse_envelope(MousePayload {
                flags: MOUSE_MOVE_ABSOLUTE,
                last_x: 65535,
                last_y: 0,
                ..MousePayload::default()
            }),
            |_| panic!("metadata must not be resolved"),
            &Wide,
        );
        assert!(dropped.is_none());
    }
}
