//! Modifier flag bit set.
//!
//! macOS reports the modifier state of every keyboard event as a 64-bit
//! `CGEventFlags` mask.  Only five bits matter to Keyswap:
//!
//! ```text
//! bit 16  Caps Lock active   (kCGEventFlagMaskAlphaShift)
//! bit 17  Shift              (kCGEventFlagMaskShift)
//! bit 18  Control            (kCGEventFlagMaskControl)
//! bit 19  Option             (kCGEventFlagMaskAlternate)
//! bit 20  Command            (kCGEventFlagMaskCommand)
//! ```
//!
//! The remaining bits (numeric pad, help, secondary Fn, device-dependent
//! left/right bits) are carried through untouched so that a passthrough or a
//! modifier-transparent remap re-emits exactly what the OS reported.
//!
//! # Why "user bits"?
//!
//! Rule matching compares only Shift, Control, Option and Command: the
//! modifiers a user deliberately holds.  Caps Lock is a *lock state*, not a
//! held key, so a rule for "Home" must still fire while Caps Lock happens to
//! be on.  [`ModifierFlags::user_bits`] strips everything else.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// A `CGEventFlags`-compatible modifier bit set.
///
/// Serialises as the raw `u64` so persisted rules stay readable by any
/// client that understands `CGEventFlags`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierFlags(pub u64);

impl ModifierFlags {
    pub const NONE: ModifierFlags = ModifierFlags(0);
    pub const CAPS_LOCK: ModifierFlags = ModifierFlags(1 << 16);
    pub const SHIFT: ModifierFlags = ModifierFlags(1 << 17);
    pub const CONTROL: ModifierFlags = ModifierFlags(1 << 18);
    pub const OPTION: ModifierFlags = ModifierFlags(1 << 19);
    pub const COMMAND: ModifierFlags = ModifierFlags(1 << 20);

    /// The four modifiers compared by the rule matcher.
    pub const USER_MASK: ModifierFlags = ModifierFlags(
        Self::SHIFT.0 | Self::CONTROL.0 | Self::OPTION.0 | Self::COMMAND.0,
    );

    /// Returns the raw `CGEventFlags` value.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Builds a flag set from a raw `CGEventFlags` value, keeping every bit.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns only the Shift/Control/Option/Command bits.
    pub const fn user_bits(self) -> ModifierFlags {
        ModifierFlags(self.0 & Self::USER_MASK.0)
    }

    /// Returns `true` if every bit in `other` is also set in `self`.
    pub const fn contains(self, other: ModifierFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `self` with every bit of `other` cleared.
    pub const fn without(self, other: ModifierFlags) -> ModifierFlags {
        ModifierFlags(self.0 & !other.0)
    }

    /// Returns `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if none of the four user modifiers is held.
    pub const fn has_no_user_modifiers(self) -> bool {
        self.user_bits().is_empty()
    }

    /// Returns `true` if the Caps Lock state bit is set.
    pub const fn caps_lock(self) -> bool {
        self.contains(Self::CAPS_LOCK)
    }

    pub const fn shift(self) -> bool {
        self.contains(Self::SHIFT)
    }

    pub const fn control(self) -> bool {
        self.contains(Self::CONTROL)
    }

    pub const fn option(self) -> bool {
        self.contains(Self::OPTION)
    }

    pub const fn command(self) -> bool {
        self.contains(Self::COMMAND)
    }
}

impl BitOr for ModifierFlags {
    type Output = ModifierFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ModifierFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModifierFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ModifierFlags {
    type Output = ModifierFlags;

    fn bitand(self, rhs: Self) -> Self::Output {
        ModifierFlags(self.0 & rhs.0)
    }
}

impl From<u64> for ModifierFlags {
    fn from(bits: u64) -> Self {
        ModifierFlags(bits)
    }
}

/// Renders the flags in the order macOS menus use: `⌃⌥⇧⌘`, then `⇪`.
impl fmt::Display for ModifierFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.control() {
            f.write_str("⌃")?;
        }
        if self.option() {
            f.write_str("⌥")?;
        }
        if self.shift() {
            f.write_str("⇧")?;
        }
        if self.command() {
            f.write_str("⌘")?;
        }
        if self.caps_lock() {
            f.write_str("⇪")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_bits_strips_caps_lock_and_device_bits() {
        // Arrange – Shift + Caps Lock + a device-dependent left-shift bit (0x02)
        let flags = ModifierFlags::SHIFT | ModifierFlags::CAPS_LOCK | ModifierFlags(0x02);

        // Act
        let user = flags.user_bits();

        // Assert
        assert_eq!(user, ModifierFlags::SHIFT);
    }

    #[test]
    fn test_has_no_user_modifiers_ignores_caps_lock() {
        assert!(ModifierFlags::CAPS_LOCK.has_no_user_modifiers());
        assert!(!ModifierFlags::COMMAND.has_no_user_modifiers());
    }

    #[test]
    fn test_without_clears_only_given_bits() {
        let flags = ModifierFlags::CAPS_LOCK | ModifierFlags::SHIFT;
        assert_eq!(flags.without(ModifierFlags::CAPS_LOCK), ModifierFlags::SHIFT);
    }

    #[test]
    fn test_constants_match_cg_event_flag_masks() {
        assert_eq!(ModifierFlags::CAPS_LOCK.bits(), 0x0001_0000);
        assert_eq!(ModifierFlags::SHIFT.bits(), 0x0002_0000);
        assert_eq!(ModifierFlags::CONTROL.bits(), 0x0004_0000);
        assert_eq!(ModifierFlags::OPTION.bits(), 0x0008_0000);
        assert_eq!(ModifierFlags::COMMAND.bits(), 0x0010_0000);
    }

    #[test]
    fn test_display_uses_menu_glyph_order() {
        let flags = ModifierFlags::COMMAND | ModifierFlags::SHIFT | ModifierFlags::CONTROL;
        assert_eq!(flags.to_string(), "⌃⇧⌘");
    }

    #[test]
    fn test_serializes_as_raw_integer() {
        let json = serde_json::to_string(&ModifierFlags::COMMAND).unwrap();
        assert_eq!(json, "1048576");
        let back: ModifierFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModifierFlags::COMMAND);
    }
}
