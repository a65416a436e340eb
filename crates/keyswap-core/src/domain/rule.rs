//! Remap rule entity.
//!
//! A [`Rule`] says "when physical key X is pressed with exactly modifiers M,
//! in an application allowed by the app filter, emit key Y with modifiers N
//! instead".  The discard sentinel says "emit nothing".
//!
//! # Discard sentinel
//!
//! There is no `discard: bool` field.  A rule discards its key when its
//! target is `(target_key_code == 0, target_modifiers == None)`.  Key code 0
//! is also `kVK_ANSI_A`, so "remap to A" must carry explicit target modifiers
//! (`Some(ModifierFlags::NONE)`) to be distinguishable from "discard".
//!
//! # Serialised form
//!
//! Rules persist as camelCase JSON objects:
//!
//! ```json
//! { "id": "…", "kind": "KeySwap",
//!   "sourceKeyCode": 115, "sourceKeyName": "Home",
//!   "targetKeyCode": 123, "targetKeyName": "←", "targetModifiers": 1048576,
//!   "isEnabled": true, "appFilterMode": "All", "filteredApps": [] }
//! ```
//!
//! `sourceModifiers`/`targetModifiers` are omitted when absent.
//! `appFilterMode`/`filteredApps` default to `All`/`[]` so that files written
//! before app filtering existed still load.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::modifiers::ModifierFlags;
use crate::keymap::{KeyMapper, MAX_KEY_CODE};

/// Key code of the discard sentinel target.
pub const DISCARD_KEY_CODE: u16 = 0;

/// Display name stored on discard rules.
pub const DISCARD_KEY_NAME: &str = "Discard";

/// Stable identifier of a rule, assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub Uuid);

impl RuleId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        RuleId(Uuid::new_v4())
    }

    /// Returns `true` for the all-zero UUID, which is never assigned.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(RuleId)
    }
}

/// What kind of rule this is.  Only the rule editor cares; the matcher treats
/// both kinds identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// Arbitrary key → key swap.
    KeySwap,
    /// Key → predefined action from the action catalog.
    NavigationAction,
}

/// Which applications a rule applies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AppFilterMode {
    /// Applies everywhere; `filtered_apps` is ignored.
    #[default]
    All,
    /// Applies only when the frontmost app is in `filtered_apps`.
    Include,
    /// Applies everywhere except when the frontmost app is in `filtered_apps`.
    Exclude,
}

impl AppFilterMode {
    /// Returns `true` if a rule with this mode and app set may fire while
    /// `frontmost` is the active application.
    ///
    /// An unknown frontmost app (`None`) is outside every set: `Include`
    /// rules do not fire, `Exclude` rules do.
    pub fn allows(self, filtered_apps: &BTreeSet<String>, frontmost: Option<&str>) -> bool {
        match self {
            AppFilterMode::All => true,
            AppFilterMode::Include => frontmost.is_some_and(|app| filtered_apps.contains(app)),
            AppFilterMode::Exclude => !frontmost.is_some_and(|app| filtered_apps.contains(app)),
        }
    }
}

/// Reasons a rule is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule id must not be the nil UUID")]
    NilId,

    #[error("source key name must not be empty")]
    EmptySourceName,

    #[error("source key code {0} is outside the valid range 0..={MAX_KEY_CODE}")]
    SourceKeyOutOfRange(u16),

    #[error("target key code {0} is outside the valid range 0..={MAX_KEY_CODE}")]
    TargetKeyOutOfRange(u16),
}

/// The editable part of a rule: everything except its id and enabled flag.
///
/// The rule editor builds a draft, and the rule store turns it into a
/// [`Rule`] (on add) or applies it to an existing one (on update).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub kind: RuleKind,
    pub source_key_code: u16,
    pub source_key_name: String,
    pub source_modifiers: Option<ModifierFlags>,
    pub target_key_code: u16,
    pub target_key_name: String,
    pub target_modifiers: Option<ModifierFlags>,
    pub app_filter_mode: AppFilterMode,
    pub filtered_apps: BTreeSet<String>,
}

impl RuleDraft {
    /// A plain key swap: `source` (no modifiers) → `target` with the event's
    /// own modifiers carried over.
    pub fn key_swap(source_key_code: u16, target_key_code: u16) -> Self {
        Self {
            kind: RuleKind::KeySwap,
            source_key_code,
            source_key_name: KeyMapper::key_name_or_hex(source_key_code),
            source_modifiers: None,
            target_key_code,
            target_key_name: KeyMapper::key_name_or_hex(target_key_code),
            // Key code 0 without modifiers would be the discard sentinel.
            target_modifiers: (target_key_code == DISCARD_KEY_CODE).then_some(ModifierFlags::NONE),
            app_filter_mode: AppFilterMode::All,
            filtered_apps: BTreeSet::new(),
        }
    }

    /// A rule that blocks `source` entirely.
    pub fn discard(source_key_code: u16) -> Self {
        Self {
            kind: RuleKind::KeySwap,
            source_key_code,
            source_key_name: KeyMapper::key_name_or_hex(source_key_code),
            source_modifiers: None,
            target_key_code: DISCARD_KEY_CODE,
            target_key_name: DISCARD_KEY_NAME.to_string(),
            target_modifiers: None,
            app_filter_mode: AppFilterMode::All,
            filtered_apps: BTreeSet::new(),
        }
    }

    /// Requires exactly `modifiers` to be held on the source key.
    ///
    /// A swap onto key code 0 cannot leave its target modifiers open (that
    /// would be the discard sentinel), so it is pinned to the required set.
    pub fn with_source_modifiers(mut self, modifiers: ModifierFlags) -> Self {
        let required = modifiers.user_bits();
        let previous = self.source_modifiers.unwrap_or(ModifierFlags::NONE);
        if self.kind == RuleKind::KeySwap
            && self.target_key_code == DISCARD_KEY_CODE
            && self.target_modifiers == Some(previous)
        {
            self.target_modifiers = Some(required);
        }
        self.source_modifiers = Some(required);
        self
    }

    /// Emits fixed `modifiers` instead of the event's own.
    pub fn with_target_modifiers(mut self, modifiers: ModifierFlags) -> Self {
        self.target_modifiers = Some(modifiers);
        self
    }

    /// Restricts the rule to (`Include`) or away from (`Exclude`) `apps`.
    pub fn with_app_filter<I, S>(mut self, mode: AppFilterMode, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app_filter_mode = mode;
        self.filtered_apps = apps.into_iter().map(Into::into).collect();
        self
    }
}

/// A single remap rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub kind: RuleKind,
    pub source_key_code: u16,
    pub source_key_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_modifiers: Option<ModifierFlags>,
    pub target_key_code: u16,
    pub target_key_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_modifiers: Option<ModifierFlags>,
    pub is_enabled: bool,
    #[serde(default)]
    pub app_filter_mode: AppFilterMode,
    #[serde(default)]
    pub filtered_apps: BTreeSet<String>,
}

impl Rule {
    /// Creates an enabled rule with a fresh id from `draft`.
    pub fn from_draft(draft: RuleDraft) -> Self {
        let mut rule = Self {
            id: RuleId::new(),
            kind: draft.kind,
            source_key_code: draft.source_key_code,
            source_key_name: draft.source_key_name,
            source_modifiers: draft.source_modifiers,
            target_key_code: draft.target_key_code,
            target_key_name: draft.target_key_name,
            target_modifiers: draft.target_modifiers,
            is_enabled: true,
            app_filter_mode: draft.app_filter_mode,
            filtered_apps: draft.filtered_apps,
        };
        rule.normalize();
        rule
    }

    /// Replaces every editable field with `draft`, keeping `id` and
    /// `is_enabled`.
    pub fn apply_draft(&mut self, draft: RuleDraft) {
        self.kind = draft.kind;
        self.source_key_code = draft.source_key_code;
        self.source_key_name = draft.source_key_name;
        self.source_modifiers = draft.source_modifiers;
        self.target_key_code = draft.target_key_code;
        self.target_key_name = draft.target_key_name;
        self.target_modifiers = draft.target_modifiers;
        self.app_filter_mode = draft.app_filter_mode;
        self.filtered_apps = draft.filtered_apps;
        self.normalize();
    }

    /// Returns `true` if this rule blocks its key instead of remapping it.
    pub fn is_discard(&self) -> bool {
        self.target_key_code == DISCARD_KEY_CODE && self.target_modifiers.is_none()
    }

    /// Clears `filtered_apps` when the mode makes it meaningless.
    pub fn normalize(&mut self) {
        if self.app_filter_mode == AppFilterMode::All {
            self.filtered_apps.clear();
        }
    }

    /// Checks the invariants a stored rule must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`RuleError`].
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.id.is_nil() {
            return Err(RuleError::NilId);
        }
        if self.source_key_name.trim().is_empty() {
            return Err(RuleError::EmptySourceName);
        }
        if self.source_key_code > MAX_KEY_CODE {
            return Err(RuleError::SourceKeyOutOfRange(self.source_key_code));
        }
        if self.target_key_code > MAX_KEY_CODE {
            return Err(RuleError::TargetKeyOutOfRange(self.target_key_code));
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source_mods = self.source_modifiers.unwrap_or_default();
        write!(f, "{source_mods}{} → ", self.source_key_name)?;
        if self.is_discard() {
            f.write_str(DISCARD_KEY_NAME)?;
        } else {
            let target_mods = self.target_modifiers.unwrap_or_default();
            write!(f, "{target_mods}{}", self.target_key_name)?;
        }
        match self.app_filter_mode {
            AppFilterMode::All => Ok(()),
            AppFilterMode::Include => write!(f, " (only {} apps)", self.filtered_apps.len()),
            AppFilterMode::Exclude => write!(f, " (except {} apps)", self.filtered_apps.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::macos_cg::{KEY_A, KEY_CAPS_LOCK, KEY_HOME, KEY_LEFT_ARROW, KEY_X};

    fn apps(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ── Discard sentinel ──────────────────────────────────────────────────────

    #[test]
    fn test_discard_draft_produces_sentinel_target() {
        let rule = Rule::from_draft(RuleDraft::discard(KEY_CAPS_LOCK));
        assert!(rule.is_discard());
        assert_eq!(rule.target_key_code, 0);
        assert_eq!(rule.target_modifiers, None);
    }

    #[test]
    fn test_key_swap_to_key_a_is_not_discard() {
        // Arrange – kVK_ANSI_A is key code 0, the same as the sentinel code
        let rule = Rule::from_draft(RuleDraft::key_swap(KEY_HOME, KEY_A));

        // Assert – explicit empty target modifiers keep it a real remap
        assert!(!rule.is_discard());
        assert_eq!(rule.target_modifiers, Some(ModifierFlags::NONE));
    }

    #[test]
    fn test_key_swap_to_key_a_carries_required_source_modifiers() {
        // Arrange
        let draft = RuleDraft::key_swap(KEY_X, KEY_A).with_source_modifiers(ModifierFlags::SHIFT);

        // Act
        let rule = Rule::from_draft(draft);

        // Assert
        assert!(!rule.is_discard());
        assert_eq!(rule.target_modifiers, Some(ModifierFlags::SHIFT));
    }

    #[test]
    fn test_explicit_target_modifiers_survive_source_modifiers_on_key_a_swap() {
        let draft = RuleDraft::key_swap(KEY_X, KEY_A)
            .with_target_modifiers(ModifierFlags::COMMAND)
            .with_source_modifiers(ModifierFlags::SHIFT);

        assert_eq!(draft.target_modifiers, Some(ModifierFlags::COMMAND));
    }

    #[test]
    fn test_discard_is_independent_of_display_name() {
        let mut rule = Rule::from_draft(RuleDraft::discard(KEY_HOME));
        rule.target_key_name = "Anything".to_string();
        assert!(rule.is_discard());
    }

    // ── App filter ────────────────────────────────────────────────────────────

    #[test]
    fn test_include_filter_allows_only_listed_apps() {
        let set = apps(&["app.editor"]);
        assert!(AppFilterMode::Include.allows(&set, Some("app.editor")));
        assert!(!AppFilterMode::Include.allows(&set, Some("app.browser")));
        assert!(!AppFilterMode::Include.allows(&set, None));
    }

    #[test]
    fn test_exclude_filter_blocks_only_listed_apps() {
        let set = apps(&["app.editor"]);
        assert!(!AppFilterMode::Exclude.allows(&set, Some("app.editor")));
        assert!(AppFilterMode::Exclude.allows(&set, Some("app.browser")));
        assert!(AppFilterMode::Exclude.allows(&set, None));
    }

    #[test]
    fn test_all_mode_clears_filtered_apps_on_creation() {
        // Arrange
        let mut draft = RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW);
        draft.filtered_apps = apps(&["leftover"]);

        // Act
        let rule = Rule::from_draft(draft);

        // Assert
        assert!(rule.filtered_apps.is_empty());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_accepts_well_formed_rule() {
        let rule = Rule::from_draft(RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW));
        assert_eq!(rule.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_empty_source_name() {
        let mut rule = Rule::from_draft(RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW));
        rule.source_key_name = "  ".to_string();
        assert_eq!(rule.validate(), Err(RuleError::EmptySourceName));
    }

    #[test]
    fn test_validate_rejects_out_of_range_codes() {
        let mut rule = Rule::from_draft(RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW));
        rule.source_key_code = 500;
        assert_eq!(rule.validate(), Err(RuleError::SourceKeyOutOfRange(500)));

        rule.source_key_code = KEY_HOME;
        rule.target_key_code = 0x80;
        assert_eq!(rule.validate(), Err(RuleError::TargetKeyOutOfRange(0x80)));
    }

    #[test]
    fn test_validate_rejects_nil_id() {
        let mut rule = Rule::from_draft(RuleDraft::discard(KEY_HOME));
        rule.id = RuleId(Uuid::nil());
        assert_eq!(rule.validate(), Err(RuleError::NilId));
    }

    // ── Drafts ────────────────────────────────────────────────────────────────

    #[test]
    fn test_apply_draft_keeps_id_and_enabled_flag() {
        // Arrange
        let mut rule = Rule::from_draft(RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW));
        rule.is_enabled = false;
        let id = rule.id;

        // Act
        rule.apply_draft(RuleDraft::discard(KEY_CAPS_LOCK));

        // Assert
        assert_eq!(rule.id, id);
        assert!(!rule.is_enabled);
        assert_eq!(rule.source_key_code, KEY_CAPS_LOCK);
        assert!(rule.is_discard());
    }

    #[test]
    fn test_source_modifiers_are_reduced_to_user_bits() {
        let draft = RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW)
            .with_source_modifiers(ModifierFlags::SHIFT | ModifierFlags::CAPS_LOCK);
        assert_eq!(draft.source_modifiers, Some(ModifierFlags::SHIFT));
    }

    // ── Serialised form ───────────────────────────────────────────────────────

    #[test]
    fn test_serializes_with_camel_case_keys_and_omits_absent_modifiers() {
        // Arrange
        let rule = Rule::from_draft(RuleDraft::discard(KEY_CAPS_LOCK));

        // Act
        let json = serde_json::to_value(&rule).unwrap();

        // Assert
        assert_eq!(json["sourceKeyCode"], 57);
        assert_eq!(json["kind"], "KeySwap");
        assert_eq!(json["appFilterMode"], "All");
        assert!(json.get("sourceModifiers").is_none());
        assert!(json.get("targetModifiers").is_none());
    }

    #[test]
    fn test_missing_app_filter_fields_default_to_all() {
        // Arrange – a record written before app filtering existed
        let json = r#"{
            "id": "6f1c1c52-8d3e-4a39-9f51-0a6d2f0c9b11",
            "kind": "NavigationAction",
            "sourceKeyCode": 115, "sourceKeyName": "Home",
            "targetKeyCode": 123, "targetKeyName": "←", "targetModifiers": 1048576,
            "isEnabled": true
        }"#;

        // Act
        let rule: Rule = serde_json::from_str(json).expect("legacy record must parse");

        // Assert
        assert_eq!(rule.app_filter_mode, AppFilterMode::All);
        assert!(rule.filtered_apps.is_empty());
        assert_eq!(rule.target_modifiers, Some(ModifierFlags::COMMAND));
    }

    #[test]
    fn test_display_shows_modifiers_and_names() {
        let rule = Rule::from_draft(
            RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW)
                .with_target_modifiers(ModifierFlags::COMMAND),
        );
        assert_eq!(rule.to_string(), "Home → ⌘←");
    }
}
