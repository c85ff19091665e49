//! Message-only window, window class and the message loop.

use crate::error::{last_error, PlatformError, PlatformResult};
use crate::wide::to_wide;
use rawin_core::{
    route, DeviceClass, DeviceHandle, Handled, Message, PumpStatus, RawEventEnvelope, RawPayload,
    WindowId, WindowToken,
};
use std::sync::OnceLock;
use tracing::{debug, trace, warn};
use windows_sys::Win32::Foundation::{GetLastError, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::Input::{
    GetRawInputData, HRAWINPUT, RAWINPUTHEADER, RID_INPUT, RIM_TYPEKEYBOARD, RIM_TYPEMOUSE,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetWindowThreadProcessId, PostMessageW, PostQuitMessage, PostThreadMessageW, RegisterClassW,
    RegisterWindowMessageW, TranslateMessage, CREATESTRUCTW, GWLP_USERDATA, HWND_MESSAGE, MSG,
    WM_APP, WM_CREATE, WM_DESTROY, WM_DEVICECHANGE, WM_INPUT, WM_INPUT_DEVICE_CHANGE,
    WM_NCCREATE, WM_QUIT, WNDCLASSW,
};

const CLASS_NAME: &str = "RawinMessageWindow";
const WAKE_MESSAGE_NAME: &str = "RawinPumpWake";
const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;
// dbt.h
const DBT_DEVNODES_CHANGED: WPARAM = 0x0007;

static CLASS: OnceLock<PlatformResult<()>> = OnceLock::new();
static WAKE: OnceLock<u32> = OnceLock::new();

/// Message id used for pump wake-ups. Falls back to a private `WM_APP` id if
/// the registered message cannot be obtained.
fn wake_message() -> u32 {
    *WAKE.get_or_init(|| {
        let name = to_wide(WAKE_MESSAGE_NAME);
        let id = unsafe { RegisterWindowMessageW(name.as_ptr()) };
        if id == 0 {
            warn!("RegisterWindowMessageW failed, using WM_APP for wake-ups");
            WM_APP + 0x2A
        } else {
            id
        }
    })
}

pub(super) fn register_class() -> PlatformResult<()> {
    CLASS
        .get_or_init(|| {
            let class_name = to_wide(CLASS_NAME);
            let wc = WNDCLASSW {
                style: 0,
                lpfnWndProc: Some(window_proc),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: unsafe { GetModuleHandleW(std::ptr::null()) },
                hIcon: std::ptr::null_mut(),
                hCursor: std::ptr::null_mut(),
                hbrBackground: std::ptr::null_mut(),
                lpszMenuName: std::ptr::null(),
                lpszClassName: class_name.as_ptr(),
            };
            // The class name is copied by RegisterClassW.
            if unsafe { RegisterClassW(&wc) } == 0 {
                let code = unsafe { GetLastError() };
                if code != ERROR_CLASS_ALREADY_EXISTS {
                    return Err(PlatformError::Win32 {
                        call: "RegisterClassW",
                        code,
                    });
                }
            }
            debug!(class = CLASS_NAME, "Window class registered");
            Ok(())
        })
        .clone()
}

pub(super) fn create_message_window(token: WindowToken) -> PlatformResult<WindowId> {
    let class_name = to_wide(CLASS_NAME);
    let window_name = to_wide("rawin");
    let hwnd = unsafe {
        CreateWindowExW(
            0,
            class_name.as_ptr(),
            window_name.as_ptr(),
            0,
            0,
            0,
            0,
            0,
            HWND_MESSAGE,
            std::ptr::null_mut(),
            GetModuleHandleW(std::ptr::null()),
            token.into_raw() as *const core::ffi::c_void,
        )
    };
    if hwnd.is_null() {
        return Err(last_error("CreateWindowExW"));
    }
    debug!(hwnd = ?hwnd, "Message window created");
    Ok(WindowId(hwnd as usize))
}

pub(super) fn pump_message() -> PlatformResult<PumpStatus> {
    let mut msg: MSG = unsafe { std::mem::zeroed() };
    match unsafe { GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) } {
        0 => Ok(PumpStatus::Quit),
        -1 => Err(last_error("GetMessageW")),
        _ => {
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            Ok(PumpStatus::Continue)
        }
    }
}

pub(super) fn post_message(window: WindowId, message: Message) -> PlatformResult<()> {
    let hwnd = window.0 as HWND;
    let (call, ok) = match message {
        Message::Wake => ("PostMessageW", unsafe {
            PostMessageW(hwnd, wake_message(), 0, 0)
        }),
        Message::Quit => {
            let thread = unsafe { GetWindowThreadProcessId(hwnd, std::ptr::null_mut()) };
            if thread == 0 {
                return Err(last_error("GetWindowThreadProcessId"));
            }
            ("PostThreadMessageW", unsafe {
                PostThreadMessageW(thread, WM_QUIT, 0, 0)
            })
        }
        Message::Other { id, wparam, lparam } => ("PostMessageW", unsafe {
            PostMessageW(hwnd, id, wparam, lparam)
        }),
        other => {
            return Err(PlatformError::InvalidArgument(format!(
                "{other:?} cannot be posted to a native window"
            )))
        }
    };
    if ok == 0 {
        return Err(last_error(call));
    }
    Ok(())
}

pub(super) fn post_quit() {
    unsafe { PostQuitMessage(0) };
}

pub(super) fn destroy_window(window: WindowId) {
    if unsafe { DestroyWindow(window.0 as HWND) } == 0 {
        let code = unsafe { GetLastError() };
        warn!(window = window.0, code, "DestroyWindow failed");
    }
}

#[cfg(target_pointer_width = "64")]
unsafe fn set_user_data(hwnd: HWND, value: usize) {
    windows_sys::Win32::UI::WindowsAndMessaging::SetWindowLongPtrW(
        hwnd,
        GWLP_USERDATA,
        value as isize,
    );
}

#[cfg(target_pointer_width = "64")]
unsafe fn user_data(hwnd: HWND) -> usize {
    windows_sys::Win32::UI::WindowsAndMessaging::GetWindowLongPtrW(hwnd, GWLP_USERDATA) as usize
}

#[cfg(target_pointer_width = "32")]
unsafe fn set_user_data(hwnd: HWND, value: usize) {
    windows_sys::Win32::UI::WindowsAndMessaging::SetWindowLongW(hwnd, GWLP_USERDATA, value as i32);
}

#[cfg(target_pointer_width = "32")]
unsafe fn user_data(hwnd: HWND) -> usize {
    windows_sys::Win32::UI::WindowsAndMessaging::GetWindowLongW(hwnd, GWLP_USERDATA) as u32 as usize
}

/// Single window procedure for every receiver window. The routing token is
/// stored in the window's user data while handling `WM_NCCREATE`.
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_NCCREATE {
        let create = &*(lparam as *const CREATESTRUCTW);
        set_user_data(hwnd, create.lpCreateParams as usize);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let Some(token) = WindowToken::from_raw(user_data(hwnd)) else {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    };

    let message = translate(msg, wparam, lparam);
    match route(token, WindowId(hwnd as usize), &message) {
        Handled::Yes => 0,
        Handled::No => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn translate(msg: u32, wparam: WPARAM, lparam: LPARAM) -> Message {
    match msg {
        WM_CREATE => Message::Create,
        WM_DESTROY => Message::Destroy,
        WM_INPUT => match unsafe { read_raw_input(lparam) } {
            Some(envelope) => Message::Input(envelope),
            None => Message::Other {
                id: msg,
                wparam,
                lparam,
            },
        },
        WM_INPUT_DEVICE_CHANGE => Message::DeviceChange,
        WM_DEVICECHANGE if wparam == DBT_DEVNODES_CHANGED => Message::DeviceChange,
        _ if msg == wake_message() => Message::Wake,
        _ => Message::Other {
            id: msg,
            wparam,
            lparam,
        },
    }
}

/// Copy the `RAWINPUT` block behind a `WM_INPUT` out of the system buffer.
unsafe fn read_raw_input(lparam: LPARAM) -> Option<RawEventEnvelope> {
    let header_size = std::mem::size_of::<RAWINPUTHEADER>() as u32;
    let mut size: u32 = 0;

    if GetRawInputData(
        lparam as HRAWINPUT,
        RID_INPUT,
        std::ptr::null_mut(),
        &mut size,
        header_size,
    ) != 0
        || size < header_size
    {
        return None;
    }

    let mut buffer = vec![0u8; size as usize];
    let copied = GetRawInputData(
        lparam as HRAWINPUT,
        RID_INPUT,
        buffer.as_mut_ptr().cast(),
        &mut size,
        header_size,
    );
    if copied == u32::MAX || copied < header_size {
        warn!("GetRawInputData failed");
        return None;
    }

    let header = std::ptr::read_unaligned(buffer.as_ptr() as *const RAWINPUTHEADER);
    let class = match header.dwType {
        RIM_TYPEMOUSE => DeviceClass::Mouse,
        RIM_TYPEKEYBOARD => DeviceClass::Keyboard,
        other => {
            trace!(kind = other, "Ignoring raw input from a non-keyboard, non-mouse device");
            return None;
        }
    };
    let end = (copied as usize).min(buffer.len());
    Some(RawEventEnvelope {
        device: DeviceHandle(header.hDevice as usize),
        class,
        payload: RawPayload::from_slice(&buffer[header_size as usize..end]),
    })
}
