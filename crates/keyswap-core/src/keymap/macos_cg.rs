//! macOS virtual key code (`CGKeyCode`) table.
//!
//! CGKeyCode values are defined in Carbon Events.h (HIToolbox framework).
//! Reference: /System/Library/Frameworks/Carbon.framework/Versions/A/Frameworks/HIToolbox.framework/Headers/Events.h
//!
//! The codes name *physical key positions* on an ANSI layout, not characters:
//! `kVK_ANSI_A` is 0x00 on every layout, even where that key types "Q".

/// Highest virtual key code produced by Apple keyboards (`kVK_UpArrow` = 0x7E,
/// plus one spare slot).  Codes above this are rejected when rules are loaded.
pub const MAX_KEY_CODE: u16 = 0x7F;

pub const KEY_A: u16 = 0x00; // kVK_ANSI_A
pub const KEY_C: u16 = 0x08; // kVK_ANSI_C
pub const KEY_B: u16 = 0x0B; // kVK_ANSI_B
pub const KEY_F: u16 = 0x03; // kVK_ANSI_F
pub const KEY_H: u16 = 0x04; // kVK_ANSI_H
pub const KEY_M: u16 = 0x2E; // kVK_ANSI_M
pub const KEY_N: u16 = 0x2D; // kVK_ANSI_N
pub const KEY_Q: u16 = 0x0C; // kVK_ANSI_Q
pub const KEY_S: u16 = 0x01; // kVK_ANSI_S
pub const KEY_T: u16 = 0x11; // kVK_ANSI_T
pub const KEY_V: u16 = 0x09; // kVK_ANSI_V
pub const KEY_W: u16 = 0x0D; // kVK_ANSI_W
pub const KEY_X: u16 = 0x07; // kVK_ANSI_X
pub const KEY_Z: u16 = 0x06; // kVK_ANSI_Z
pub const KEY_GRAVE: u16 = 0x32; // kVK_ANSI_Grave
pub const KEY_LEFT_BRACKET: u16 = 0x21; // kVK_ANSI_LeftBracket
pub const KEY_RIGHT_BRACKET: u16 = 0x1E; // kVK_ANSI_RightBracket
pub const KEY_RETURN: u16 = 0x24; // kVK_Return
pub const KEY_TAB: u16 = 0x30; // kVK_Tab
pub const KEY_SPACE: u16 = 0x31; // kVK_Space
pub const KEY_DELETE: u16 = 0x33; // kVK_Delete (backspace)
pub const KEY_ESCAPE: u16 = 0x35; // kVK_Escape
pub const KEY_CAPS_LOCK: u16 = 0x39; // kVK_CapsLock
pub const KEY_HOME: u16 = 0x73; // kVK_Home
pub const KEY_PAGE_UP: u16 = 0x74; // kVK_PageUp
pub const KEY_FORWARD_DELETE: u16 = 0x75; // kVK_ForwardDelete
pub const KEY_END: u16 = 0x77; // kVK_End
pub const KEY_PAGE_DOWN: u16 = 0x79; // kVK_PageDown
pub const KEY_LEFT_ARROW: u16 = 0x7B; // kVK_LeftArrow
pub const KEY_RIGHT_ARROW: u16 = 0x7C; // kVK_RightArrow
pub const KEY_DOWN_ARROW: u16 = 0x7D; // kVK_DownArrow
pub const KEY_UP_ARROW: u16 = 0x7E; // kVK_UpArrow

/// `(CGKeyCode, display name)` pairs, ordered by key code.
pub(crate) const KEY_NAMES: &[(u16, &str)] = &[
    (0x00, "A"),
    (0x01, "S"),
    (0x02, "D"),
    (0x03, "F"),
    (0x04, "H"),
    (0x05, "G"),
    (0x06, "Z"),
    (0x07, "X"),
    (0x08, "C"),
    (0x09, "V"),
    (0x0A, "§"), // kVK_ISO_Section
    (0x0B, "B"),
    (0x0C, "Q"),
    (0x0D, "W"),
    (0x0E, "E"),
    (0x0F, "R"),
    (0x10, "Y"),
    (0x11, "T"),
    (0x12, "1"),
    (0x13, "2"),
    (0x14, "3"),
    (0x15, "4"),
    (0x16, "6"),
    (0x17, "5"),
    (0x18, "="),
    (0x19, "9"),
    (0x1A, "7"),
    (0x1B, "-"),
    (0x1C, "8"),
    (0x1D, "0"),
    (0x1E, "]"),
    (0x1F, "O"),
    (0x20, "U"),
    (0x21, "["),
    (0x22, "I"),
    (0x23, "P"),
    (0x24, "Return"),
    (0x25, "L"),
    (0x26, "J"),
    (0x27, "'"),
    (0x28, "K"),
    (0x29, ";"),
    (0x2A, "\\"),
    (0x2B, ","),
    (0x2C, "/"),
    (0x2D, "N"),
    (0x2E, "M"),
    (0x2F, "."),
    (0x30, "Tab"),
    (0x31, "Space"),
    (0x32, "`"),
    (0x33, "Delete"),
    (0x34, "Enter"), // kVK_Powerbook_Enter (unofficial)
    (0x35, "Escape"),
    (0x36, "Right Command"),
    (0x37, "Command"),
    (0x38, "Shift"),
    (0x39, "Caps Lock"),
    (0x3A, "Option"),
    (0x3B, "Control"),
    (0x3C, "Right Shift"),
    (0x3D, "Right Option"),
    (0x3E, "Right Control"),
    (0x3F, "Fn"),
    (0x40, "F17"),
    (0x41, "Keypad ."),
    (0x43, "Keypad *"),
    (0x45, "Keypad +"),
    (0x47, "Keypad Clear"),
    (0x48, "Volume Up"),
    (0x49, "Volume Down"),
    (0x4A, "Mute"),
    (0x4B, "Keypad /"),
    (0x4C, "Keypad Enter"),
    (0x4E, "Keypad -"),
    (0x4F, "F18"),
    (0x50, "F19"),
    (0x51, "Keypad ="),
    (0x52, "Keypad 0"),
    (0x53, "Keypad 1"),
    (0x54, "Keypad 2"),
    (0x55, "Keypad 3"),
    (0x56, "Keypad 4"),
    (0x57, "Keypad 5"),
    (0x58, "Keypad 6"),
    (0x59, "Keypad 7"),
    (0x5A, "F20"),
    (0x5B, "Keypad 8"),
    (0x5C, "Keypad 9"),
    (0x5D, "¥"),  // kVK_JIS_Yen
    (0x5E, "_"),  // kVK_JIS_Underscore
    (0x5F, "Keypad ,"), // kVK_JIS_KeypadComma
    (0x60, "F5"),
    (0x61, "F6"),
    (0x62, "F7"),
    (0x63, "F3"),
    (0x64, "F8"),
    (0x65, "F9"),
    (0x66, "Eisu"), // kVK_JIS_Eisu
    (0x67, "F11"),
    (0x68, "Kana"), // kVK_JIS_Kana
    (0x69, "F13"),
    (0x6A, "F16"),
    (0x6B, "F14"),
    (0x6D, "F10"),
    (0x6E, "Context Menu"),
    (0x6F, "F12"),
    (0x71, "F15"),
    (0x72, "Help"),
    (0x73, "Home"),
    (0x74, "Page Up"),
    (0x75, "Forward Delete"),
    (0x76, "F4"),
    (0x77, "End"),
    (0x78, "F2"),
    (0x79, "Page Down"),
    (0x7A, "F1"),
    (0x7B, "←"),
    (0x7C, "→"),
    (0x7D, "↓"),
    (0x7E, "↑"),
];

/// Returns the display name for `code`, or `None` for an unassigned code.
pub fn cgkeycode_to_name(code: u16) -> Option<&'static str> {
    KEY_NAMES
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .map(|i| KEY_NAMES[i].1)
}

/// Reverse lookup, case-insensitive (`"home"` and `"Home"` both resolve).
pub fn name_to_cgkeycode(name: &str) -> Option<u16> {
    KEY_NAMES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|&(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_for_binary_search() {
        assert!(
            KEY_NAMES.windows(2).all(|w| w[0].0 < w[1].0),
            "KEY_NAMES must be strictly ascending by key code"
        );
    }

    #[test]
    fn test_all_codes_fit_valid_range() {
        assert!(KEY_NAMES.iter().all(|&(c, _)| c <= MAX_KEY_CODE));
    }

    #[test]
    fn test_key_a_maps_to_zero() {
        // kVK_ANSI_A = 0x00
        assert_eq!(cgkeycode_to_name(0x00), Some("A"));
        assert_eq!(name_to_cgkeycode("a"), Some(KEY_A));
    }

    #[test]
    fn test_navigation_keys_have_names() {
        assert_eq!(cgkeycode_to_name(KEY_HOME), Some("Home"));
        assert_eq!(cgkeycode_to_name(KEY_END), Some("End"));
        assert_eq!(cgkeycode_to_name(KEY_CAPS_LOCK), Some("Caps Lock"));
        assert_eq!(cgkeycode_to_name(KEY_LEFT_ARROW), Some("←"));
    }

    #[test]
    fn test_unassigned_code_returns_none() {
        // 0x42 is not assigned on any Apple keyboard
        assert_eq!(cgkeycode_to_name(0x42), None);
    }

    #[test]
    fn test_name_lookup_is_case_insensitive() {
        assert_eq!(name_to_cgkeycode("CAPS LOCK"), Some(57));
        assert_eq!(name_to_cgkeycode("page down"), Some(KEY_PAGE_DOWN));
        assert_eq!(name_to_cgkeycode("no such key"), None);
    }
}
