//! Device identity: handles, classes and cached descriptive metadata.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque per-session identifier of a physical input device.
///
/// Stable while the device stays attached; the OS may hand the same value to
/// another device after removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(pub usize);

impl DeviceHandle {
    pub const NULL: DeviceHandle = DeviceHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

/// The two device categories subscribed to independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Mouse,
    Keyboard,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Mouse, DeviceClass::Keyboard];

    /// HID usage page and usage identifying this class.
    pub fn usage(self) -> (u16, u16) {
        match self {
            DeviceClass::Mouse => (0x01, 0x02),
            DeviceClass::Keyboard => (0x01, 0x06),
        }
    }
}

/// Which device classes a receiver accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceScope {
    Mouse,
    Keyboard,
    #[default]
    Both,
}

impl DeviceScope {
    pub fn includes(self, class: DeviceClass) -> bool {
        matches!(
            (self, class),
            (DeviceScope::Both, _)
                | (DeviceScope::Mouse, DeviceClass::Mouse)
                | (DeviceScope::Keyboard, DeviceClass::Keyboard)
        )
    }
}

static VENDOR_ID: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)VID_([0-9A-F]{4})"));
static PRODUCT_ID: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)PID_([0-9A-F]{4})"));
static INTERFACE_NO: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)MI_([0-9]{2})"));
static COLLECTION_NO: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)Col([0-9]{2})"));
static INTERFACE_CLASS: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\{([0-9A-F\-]{36})\}"));
static PNP_SUFFIX: Lazy<Regex> = Lazy::new(|| pattern(r"#([^#]+)#\{"));

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("device path pattern is valid")
}

fn first_group(regex: &Regex, input: &str) -> String {
    regex
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Identity fields extracted from a platform device interface path such as
/// `\\?\HID#VID_046D&PID_C52B&MI_00&Col01#7&2d1f8c3b&0&0000#{378de44c-56ef-11d1-bc8c-00a0c91405dd}`.
///
/// Missing fields are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePathInfo {
    /// The full device path.
    pub path: String,
    /// Device interface class GUID.
    pub interface_class: Option<Uuid>,
    /// Vendor id (`VID_xxxx`), hex digits only.
    pub vendor_id: String,
    /// Product id (`PID_xxxx`), hex digits only.
    pub product_id: String,
    /// Interface number (`MI_xx`).
    pub interface_number: String,
    /// Top-level collection number (`Colxx`).
    pub collection_number: String,
    /// Instance suffix of the PnP identifier.
    pub pnp_suffix: String,
}

impl DevicePathInfo {
    pub fn parse(path: &str) -> Self {
        let interface_class = INTERFACE_CLASS
            .captures(path)
            .and_then(|caps| caps.get(1))
            .and_then(|m| Uuid::parse_str(m.as_str()).ok());

        Self {
            path: path.to_string(),
            interface_class,
            vendor_id: first_group(&VENDOR_ID, path),
            product_id: first_group(&PRODUCT_ID, path),
            interface_number: first_group(&INTERFACE_NO, path),
            collection_number: first_group(&COLLECTION_NO, path),
            pnp_suffix: first_group(&PNP_SUFFIX, path),
        }
    }

    /// Numeric vendor id, if present.
    pub fn vendor_id_value(&self) -> Option<u16> {
        u16::from_str_radix(&self.vendor_id, 16).ok()
    }

    /// Numeric product id, if present.
    pub fn product_id_value(&self) -> Option<u16> {
        u16::from_str_radix(&self.product_id, 16).ok()
    }
}

/// Convert a device interface path into the device instance id understood by
/// the configuration manager (`HID\VID_046D&PID_C52B\7&2d1f8c3b&0&0000`).
pub fn device_instance_id(path: &str) -> String {
    let trimmed = path.strip_prefix(r"\\?\").unwrap_or(path);
    let trimmed = match trimmed.find("#{") {
        Some(index) => &trimmed[..index],
        None => trimmed,
    };
    trimmed.replace('#', "\\")
}

/// Descriptive metadata for one device. Immutable once built; cache entries are
/// replaced wholesale, never edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub handle: DeviceHandle,
    pub friendly_name: String,
    pub manufacturer: String,
    pub product_name: String,
    pub path: DevicePathInfo,
}

impl DeviceMetadata {
    /// The canonical value used when resolution fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
