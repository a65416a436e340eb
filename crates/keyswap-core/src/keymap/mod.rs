//! Key code tables.
//!
//! Rules store raw macOS virtual key codes (`CGKeyCode`).  The tables here
//! give those codes human-readable names for the persisted `targetKeyName`
//! field, the CLI, and for back-filling names on rules saved by older builds.

pub mod macos_cg;

pub use macos_cg::MAX_KEY_CODE;

/// Unified lookup over the macOS key table.
pub struct KeyMapper;

impl KeyMapper {
    /// Returns the display name of a `CGKeyCode`.
    ///
    /// Returns `None` if the code is unassigned.
    pub fn key_name(code: u16) -> Option<&'static str> {
        macos_cg::cgkeycode_to_name(code)
    }

    /// Returns the display name of `code`, or a `"Key 0xNN"` placeholder for
    /// unassigned codes.
    pub fn key_name_or_hex(code: u16) -> String {
        match Self::key_name(code) {
            Some(name) => name.to_string(),
            None => format!("Key 0x{code:02X}"),
        }
    }

    /// Resolves a display name (case-insensitive) or a numeric literal
    /// (`"115"`, `"0x73"`) to a key code.
    pub fn parse_key(input: &str) -> Option<u16> {
        let trimmed = input.trim();
        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u16::from_str_radix(hex, 16)
                .ok()
                .filter(|&c| Self::is_valid(c));
        }
        if let Ok(code) = trimmed.parse::<u16>() {
            return Self::is_valid(code).then_some(code);
        }
        macos_cg::name_to_cgkeycode(trimmed)
    }

    /// Returns `true` if `code` is inside the device key-code range.
    pub fn is_valid(code: u16) -> bool {
        code <= MAX_KEY_CODE
    }
}
