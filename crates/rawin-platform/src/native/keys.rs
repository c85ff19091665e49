use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, MAPVK_VK_TO_VSC, MAPVK_VSC_TO_VK_EX,
};

pub(super) fn scan_code_to_virtual_key(scan_code: u16) -> u16 {
    unsafe { MapVirtualKeyW(u32::from(scan_code), MAPVK_VSC_TO_VK_EX) as u16 }
}

pub(super) fn virtual_key_to_scan_code(virtual_key: u16) -> u16 {
    unsafe { MapVirtualKeyW(u32::from(virtual_key), MAPVK_VK_TO_VSC) as u16 }
}
