//! Device enumeration and metadata lookup.
//!
//! The path comes from `RIDI_DEVICENAME`. Product and manufacturer strings are
//! read from the HID device itself; the friendly name (and a manufacturer
//! fallback) from the device node in the configuration manager.

use crate::wide::{from_wide, from_wide_bytes, to_wide};
use rawin_core::{device_instance_id, DeviceHandle, DeviceMetadata, DevicePathInfo};
use std::collections::HashSet;
use std::ffi::c_void;
use tracing::{debug, trace, warn};
use windows_sys::core::GUID;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_INSUFFICIENT_BUFFER, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::UI::Input::{
    GetRawInputDeviceInfoW, GetRawInputDeviceList, RAWINPUTDEVICELIST, RIDI_DEVICENAME,
    RIM_TYPEKEYBOARD, RIM_TYPEMOUSE,
};

const ENUMERATION_ATTEMPTS: usize = 3;
/// Size in bytes of the buffer handed to the `HidD_*` string queries.
const HID_STRING_BYTES: usize = 4092;
const HID_STRING_PRODUCT: u32 = 2;
const CM_LOCATE_DEVNODE_NORMAL: u32 = 0;
const CR_SUCCESS: u32 = 0x00;
const CR_BUFFER_SMALL: u32 = 0x1A;

#[repr(C)]
struct DevPropKey {
    fmtid: GUID,
    pid: u32,
}

const DEVPKEY_NAME: DevPropKey = DevPropKey {
    fmtid: GUID::from_u128(0xb725f130_47ef_101a_a5f1_02608c9eebac),
    pid: 10,
};

const DEVPKEY_DEVICE_MANUFACTURER: DevPropKey = DevPropKey {
    fmtid: GUID::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    pid: 13,
};

#[link(name = "hid")]
extern "system" {
    fn HidD_GetIndexedString(device: HANDLE, index: u32, buffer: *mut c_void, length: u32) -> u8;
    fn HidD_GetProductString(device: HANDLE, buffer: *mut c_void, length: u32) -> u8;
    fn HidD_GetManufacturerString(device: HANDLE, buffer: *mut c_void, length: u32) -> u8;
}

#[link(name = "cfgmgr32")]
extern "system" {
    fn CM_Locate_DevNodeW(devinst: *mut u32, device_id: *const u16, flags: u32) -> u32;
    fn CM_Get_DevNode_PropertyW(
        devinst: u32,
        key: *const DevPropKey,
        property_type: *mut u32,
        buffer: *mut u8,
        buffer_size: *mut u32,
        flags: u32,
    ) -> u32;
}

pub(super) fn attached_devices() -> HashSet<DeviceHandle> {
    let entry_size = std::mem::size_of::<RAWINPUTDEVICELIST>() as u32;

    // A device may arrive between the two calls; retry with the new count.
    for _ in 0..ENUMERATION_ATTEMPTS {
        let mut count: u32 = 0;
        if unsafe { GetRawInputDeviceList(std::ptr::null_mut(), &mut count, entry_size) } != 0 {
            warn!(code = unsafe { GetLastError() }, "GetRawInputDeviceList failed");
            return HashSet::new();
        }

        let mut list: Vec<RAWINPUTDEVICELIST> =
            vec![unsafe { std::mem::zeroed() }; count as usize];
        let found = unsafe { GetRawInputDeviceList(list.as_mut_ptr(), &mut count, entry_size) };
        if found == u32::MAX {
            let code = unsafe { GetLastError() };
            if code == ERROR_INSUFFICIENT_BUFFER {
                continue;
            }
            warn!(code, "GetRawInputDeviceList failed");
            return HashSet::new();
        }

        list.truncate(found as usize);
        return list
            .iter()
            .filter(|entry| entry.dwType == RIM_TYPEMOUSE || entry.dwType == RIM_TYPEKEYBOARD)
            .map(|entry| DeviceHandle(entry.hDevice as usize))
            .collect();
    }

    warn!("Device list kept changing during enumeration");
    HashSet::new()
}

pub(super) fn resolve_metadata(handle: DeviceHandle) -> DeviceMetadata {
    let Some(path) = device_path(handle) else {
        trace!(%handle, "No device path");
        return DeviceMetadata::empty();
    };

    let (product_name, mut manufacturer) = hid_strings(&path);
    let mut friendly_name = String::new();
    if let Some(devinst) = locate_devnode(&path) {
        friendly_name = devnode_property(devinst, &DEVPKEY_NAME).unwrap_or_default();
        if manufacturer.is_empty() {
            manufacturer = devnode_property(devinst, &DEVPKEY_DEVICE_MANUFACTURER).unwrap_or_default();
        }
    }

    debug!(%handle, friendly_name, product_name, "Resolved device metadata");
    DeviceMetadata {
        handle,
        friendly_name,
        manufacturer,
        product_name,
        path: DevicePathInfo::parse(&path),
    }
}

fn device_path(handle: DeviceHandle) -> Option<String> {
    let hdevice = handle.0 as HANDLE;
    // RIDI_DEVICENAME sizes are in characters.
    let mut chars: u32 = 0;
    unsafe { GetRawInputDeviceInfoW(hdevice, RIDI_DEVICENAME, std::ptr::null_mut(), &mut chars) };
    if chars == 0 {
        return None;
    }

    let mut buffer = vec![0u16; chars as usize];
    let copied = unsafe {
        GetRawInputDeviceInfoW(hdevice, RIDI_DEVICENAME, buffer.as_mut_ptr().cast(), &mut chars)
    };
    if copied == u32::MAX {
        return None;
    }
    let path = from_wide(&buffer);
    (!path.is_empty()).then_some(path)
}

/// Product and manufacturer strings. Either may be empty.
fn hid_strings(path: &str) -> (String, String) {
    let wide_path = to_wide(path);
    let file = unsafe {
        CreateFileW(
            wide_path.as_ptr(),
            0,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            std::ptr::null_mut(),
        )
    };
    if file == INVALID_HANDLE_VALUE {
        trace!(path, code = unsafe { GetLastError() }, "Cannot open device");
        return (String::new(), String::new());
    }

    let mut product = hid_string(|buffer, length| unsafe {
        HidD_GetIndexedString(file, HID_STRING_PRODUCT, buffer, length)
    });
    if product.is_empty() {
        product = hid_string(|buffer, length| unsafe { HidD_GetProductString(file, buffer, length) });
    }
    let manufacturer =
        hid_string(|buffer, length| unsafe { HidD_GetManufacturerString(file, buffer, length) });

    unsafe { CloseHandle(file) };
    (product, manufacturer)
}

fn hid_string(query: impl FnOnce(*mut c_void, u32) -> u8) -> String {
    let mut buffer = vec![0u16; HID_STRING_BYTES / 2];
    if query(buffer.as_mut_ptr().cast(), HID_STRING_BYTES as u32) == 0 {
        return String::new();
    }
    from_wide(&buffer)
}

fn locate_devnode(path: &str) -> Option<u32> {
    let instance_id = to_wide(&device_instance_id(path));
    let mut devinst: u32 = 0;
    let result =
        unsafe { CM_Locate_DevNodeW(&mut devinst, instance_id.as_ptr(), CM_LOCATE_DEVNODE_NORMAL) };
    (result == CR_SUCCESS).then_some(devinst)
}

fn devnode_property(devinst: u32, key: &DevPropKey) -> Option<String> {
    let mut property_type: u32 = 0;
    let mut size: u32 = 0;
    let result = unsafe {
        CM_Get_DevNode_PropertyW(
            devinst,
            key,
            &mut property_type,
            std::ptr::null_mut(),
            &mut size,
            0,
        )
    };
    if result != CR_BUFFER_SMALL {
        return None;
    }

    let mut buffer = vec![0u8; size as usize];
    let result = unsafe {
        CM_Get_DevNode_PropertyW(
            devinst,
            key,
            &mut property_type,
            buffer.as_mut_ptr(),
            &mut size,
            0,
        )
    };
    (result == CR_SUCCESS).then(|| from_wide_bytes(&buffer))
}
