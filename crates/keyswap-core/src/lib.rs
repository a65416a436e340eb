//! # keyswap-core
//!
//! Shared library for Keyswap containing the remap rule model, the modifier
//! bit set, the first-match rule matcher, the navigation action catalog, and
//! the macOS key code table.
//!
//! It has zero dependencies on OS APIs, UI frameworks, or the file system,
//! so every rule decision can be unit-tested on any platform.
//!
//! # Architecture overview (for beginners)
//!
//! Keyswap watches every key press on a Mac and, per key press, decides
//! whether to let it through, block it, or replace it with a different key
//! combination (for example: make the "Home" key jump to the start of the
//! line with ⌘← like it does on other systems).
//!
//! This crate (`keyswap-core`) is the pure decision layer:
//!
//! - **`domain`** – What a [`Rule`] is, how [`ModifierFlags`] compare, and
//!   [`match_event`], the function run on every keystroke.
//!
//! - **`keymap`** – Names for macOS virtual key codes (`kVK_*`), used when
//!   displaying and persisting rules.

pub mod domain;
pub mod keymap;

// Re-export the most-used types at the crate root so callers can write
// `keyswap_core::Rule` instead of `keyswap_core::domain::rule::Rule`.
pub use domain::catalog::{CatalogEntry, CATALOG};
pub use domain::matcher::{match_event, Action};
pub use domain::modifiers::ModifierFlags;
pub use domain::rule::{AppFilterMode, Rule, RuleDraft, RuleError, RuleId, RuleKind};
pub use keymap::KeyMapper;
