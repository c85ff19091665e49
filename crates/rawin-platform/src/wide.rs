//! UTF-16 string helpers for Win32 calls.
#![cfg_attr(not(windows), allow(dead_code))]

/// Encode `text` as a NUL-terminated UTF-16 buffer.
pub(crate) fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode a UTF-16 buffer, stopping at the first NUL.
pub(crate) fn from_wide(buffer: &[u16]) -> String {
    let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..end])
}

/// Decode a UTF-16 string stored in a byte buffer (registry style properties).
pub(crate) fn from_wide_bytes(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    from_wide(&units)
}
