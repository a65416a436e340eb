//! Navigation action catalog.
//!
//! A fixed table of common macOS shortcuts ("move to line start" = ⌘←,
//! "undo" = ⌘Z, …) that the rule editor offers as targets for
//! `NavigationAction` rules.  Picking an entry simply copies its key code and
//! modifiers onto the rule; the matcher only ever sees those resolved fields
//! and never consults this table.

use super::modifiers::ModifierFlags;
use super::rule::{AppFilterMode, RuleDraft, RuleKind, DISCARD_KEY_CODE};
use crate::keymap::macos_cg::{
    KEY_A, KEY_C, KEY_DELETE, KEY_DOWN_ARROW, KEY_F, KEY_FORWARD_DELETE, KEY_GRAVE, KEY_H,
    KEY_LEFT_ARROW, KEY_M, KEY_N, KEY_PAGE_DOWN, KEY_PAGE_UP, KEY_Q, KEY_RIGHT_ARROW, KEY_S,
    KEY_T, KEY_TAB, KEY_UP_ARROW, KEY_V, KEY_W, KEY_X, KEY_Z,
};

/// Bumped whenever an entry is added, removed or changes its shortcut.
pub const CATALOG_VERSION: u32 = 3;

/// Grouping used by the rule editor's action picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Navigation,
    Selection,
    Editing,
    Clipboard,
    Window,
    Discard,
}

/// One named shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Stable machine id, e.g. `"line_start"`.
    pub id: &'static str,
    /// Display name shown in the editor and stored as `targetKeyName`.
    pub name: &'static str,
    pub category: ActionCategory,
    pub key_code: u16,
    /// `None` only for the discard entry.
    pub modifiers: Option<ModifierFlags>,
}

impl CatalogEntry {
    /// Returns `true` for the discard sentinel entry.
    pub fn is_discard(&self) -> bool {
        self.key_code == DISCARD_KEY_CODE && self.modifiers.is_none()
    }

    /// Builds a `NavigationAction` rule draft that triggers this action from
    /// `source_key_code` held with exactly `source_modifiers`.
    pub fn to_draft(
        &self,
        source_key_code: u16,
        source_modifiers: Option<ModifierFlags>,
    ) -> RuleDraft {
        RuleDraft {
            kind: RuleKind::NavigationAction,
            source_key_code,
            source_key_name: crate::keymap::KeyMapper::key_name_or_hex(source_key_code),
            source_modifiers: source_modifiers.map(ModifierFlags::user_bits),
            target_key_code: self.key_code,
            target_key_name: self.name.to_string(),
            target_modifiers: self.modifiers,
            app_filter_mode: AppFilterMode::All,
            filtered_apps: Default::default(),
        }
    }
}

const NONE: u64 = 0;
const SHIFT: u64 = ModifierFlags::SHIFT.0;
const CTRL: u64 = ModifierFlags::CONTROL.0;
const OPT: u64 = ModifierFlags::OPTION.0;
const CMD: u64 = ModifierFlags::COMMAND.0;

const fn entry(
    id: &'static str,
    name: &'static str,
    category: ActionCategory,
    key_code: u16,
    modifiers: u64,
) -> CatalogEntry {
    CatalogEntry {
        id,
        name,
        category,
        key_code,
        modifiers: Some(ModifierFlags(modifiers)),
    }
}

use ActionCategory::{Clipboard, Editing, Navigation, Selection, Window};

/// The catalog, in the order the editor lists it.
pub static CATALOG: &[CatalogEntry] = &[
    entry("line_start", "Line Start", Navigation, KEY_LEFT_ARROW, CMD),
    entry("line_end", "Line End", Navigation, KEY_RIGHT_ARROW, CMD),
    entry("word_left", "Word Left", Navigation, KEY_LEFT_ARROW, OPT),
    entry("word_right", "Word Right", Navigation, KEY_RIGHT_ARROW, OPT),
    entry("document_top", "Document Top", Navigation, KEY_UP_ARROW, CMD),
    entry("document_bottom", "Document Bottom", Navigation, KEY_DOWN_ARROW, CMD),
    entry("page_up", "Page Up", Navigation, KEY_PAGE_UP, NONE),
    entry("page_down", "Page Down", Navigation, KEY_PAGE_DOWN, NONE),
    entry("select_line_start", "Select to Line Start", Selection, KEY_LEFT_ARROW, SHIFT | CMD),
    entry("select_line_end", "Select to Line End", Selection, KEY_RIGHT_ARROW, SHIFT | CMD),
    entry("select_word_left", "Select Word Left", Selection, KEY_LEFT_ARROW, SHIFT | OPT),
    entry("select_word_right", "Select Word Right", Selection, KEY_RIGHT_ARROW, SHIFT | OPT),
    entry("select_document_top", "Select to Document Top", Selection, KEY_UP_ARROW, SHIFT | CMD),
    entry("select_document_bottom", "Select to Document Bottom", Selection, KEY_DOWN_ARROW, SHIFT | CMD),
    entry("select_all", "Select All", Selection, KEY_A, CMD),
    entry("copy", "Copy", Clipboard, KEY_C, CMD),
    entry("cut", "Cut", Clipboard, KEY_X, CMD),
    entry("paste", "Paste", Clipboard, KEY_V, CMD),
    entry("undo", "Undo", Editing, KEY_Z, CMD),
    entry("redo", "Redo", Editing, KEY_Z, SHIFT | CMD),
    entry("find", "Find", Editing, KEY_F, CMD),
    entry("save", "Save", Editing, KEY_S, CMD),
    entry("delete_word", "Delete Word", Editing, KEY_DELETE, OPT),
    entry("forward_delete", "Forward Delete", Editing, KEY_FORWARD_DELETE, NONE),
    entry("new_window", "New Window", Window, KEY_N, CMD),
    entry("new_tab", "New Tab", Window, KEY_T, CMD),
    entry("close_tab", "Close Tab", Window, KEY_W, CMD),
    entry("close_window", "Close Window", Window, KEY_W, SHIFT | CMD),
    entry("next_tab", "Next Tab", Window, KEY_TAB, CTRL),
    entry("previous_tab", "Previous Tab", Window, KEY_TAB, CTRL | SHIFT),
    entry("next_window", "Next Window", Window, KEY_GRAVE, CMD),
    entry("minimize", "Minimize", Window, KEY_M, CMD),
    entry("hide_app", "Hide App", Window, KEY_H, CMD),
    entry("quit_app", "Quit App", Window, KEY_Q, CMD),
    CatalogEntry {
        id: "discard",
        name: super::rule::DISCARD_KEY_NAME,
        category: ActionCategory::Discard,
        key_code: DISCARD_KEY_CODE,
        modifiers: None,
    },
];

/// Finds an entry by its machine id.
pub fn lookup(id: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.id == id)
}
