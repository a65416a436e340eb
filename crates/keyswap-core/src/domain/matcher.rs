//! First-match-wins rule matcher.
//!
//! [`match_event`] is the per-keystroke decision function.  It is pure: it
//! reads the event, an immutable snapshot of the enabled rules, and the
//! cached frontmost application id, and returns an [`Action`].  It never
//! allocates, locks, or calls the OS, so it is safe to run inline on the
//! event-tap thread.
//!
//! # Algorithm
//!
//! Rules are tried in stored order; the first rule passing all three checks
//! decides the outcome:
//!
//! 1. `source_key_code` equals the event key code.
//! 2. The rule's app filter allows the frontmost application.
//! 3. The held Shift/Control/Option/Command set equals the rule's
//!    `source_modifiers` **exactly** (absent means "none held").
//!
//! Exact matching keeps every rule unambiguous: a bare "Home" rule does not
//! also fire on Shift+Home, so Shift+Home stays free for its own rule (or for
//! the system's select-to-start behaviour).

use super::modifiers::ModifierFlags;
use super::rule::Rule;

/// The outcome of matching one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No rule applies; deliver the event unchanged.
    PassThrough,
    /// Block the event entirely.
    Discard,
    /// Deliver this key and modifier set instead, with the same up/down
    /// polarity as the original.
    Remap {
        key_code: u16,
        modifiers: ModifierFlags,
    },
}

/// Returns `true` if the event's user modifiers satisfy `required`.
fn modifiers_match(required: Option<ModifierFlags>, event_flags: ModifierFlags) -> bool {
    match required {
        Some(required) => event_flags.user_bits() == required.user_bits(),
        None => event_flags.has_no_user_modifiers(),
    }
}

/// Decides what to do with one key event.
///
/// `rules` must be a point-in-time snapshot containing only enabled rules, in
/// stored order.  `is_key_down` is accepted so callers pass the full event
/// shape, but both edges of a key get the same decision: a key remapped on
/// the way down must be remapped on the way up too, or the target key would
/// be left stuck.
pub fn match_event(
    key_code: u16,
    event_flags: ModifierFlags,
    frontmost_app: Option<&str>,
    _is_key_down: bool,
    rules: &[Rule],
) -> Action {
    let Some(rule) = rules.iter().find(|rule| {
        rule.source_key_code == key_code
            && rule.app_filter_mode.allows(&rule.filtered_apps, frontmost_app)
            && modifiers_match(rule.source_modifiers, event_flags)
    }) else {
        return Action::PassThrough;
    };

    if rule.is_discard() {
        return Action::Discard;
    }

    Action::Remap {
        key_code: rule.target_key_code,
        modifiers: rule.target_modifiers.unwrap_or(event_flags),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{AppFilterMode, RuleDraft};
    use crate::keymap::macos_cg::{
        KEY_A, KEY_B, KEY_CAPS_LOCK, KEY_END, KEY_HOME, KEY_LEFT_ARROW, KEY_X,
    };

    fn rule(draft: RuleDraft) -> Rule {
        Rule::from_draft(draft)
    }

    // ── Key code ──────────────────────────────────────────────────────────────

    #[test]
    fn test_rule_never_fires_for_other_key_codes() {
        // Arrange
        let rules = [rule(RuleDraft::discard(KEY_HOME))];

        // Act / Assert – every other code in the valid range passes through
        for code in (0..=crate::keymap::MAX_KEY_CODE).filter(|&c| c != KEY_HOME) {
            assert_eq!(
                match_event(code, ModifierFlags::NONE, None, true, &rules),
                Action::PassThrough,
                "key code {code} must not match a Home rule"
            );
        }
    }

    #[test]
    fn test_empty_snapshot_passes_through() {
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, None, true, &[]),
            Action::PassThrough
        );
    }

    // ── First match wins ──────────────────────────────────────────────────────

    #[test]
    fn test_first_matching_rule_wins() {
        // Arrange – two rules for the same key
        let rules = [
            rule(RuleDraft::key_swap(KEY_HOME, KEY_A)),
            rule(RuleDraft::key_swap(KEY_HOME, KEY_B)),
        ];

        // Act
        let action = match_event(KEY_HOME, ModifierFlags::NONE, None, true, &rules);

        // Assert
        assert_eq!(
            action,
            Action::Remap {
                key_code: KEY_A,
                modifiers: ModifierFlags::NONE
            }
        );
    }

    #[test]
    fn test_skipped_rule_lets_later_rule_match() {
        // Arrange – the first rule is filtered out by app, the second applies
        let rules = [
            rule(
                RuleDraft::discard(KEY_HOME)
                    .with_app_filter(AppFilterMode::Include, ["app.editor"]),
            ),
            rule(RuleDraft::key_swap(KEY_HOME, KEY_END)),
        ];

        // Act
        let action = match_event(KEY_HOME, ModifierFlags::NONE, Some("app.browser"), true, &rules);

        // Assert
        assert!(matches!(action, Action::Remap { key_code: KEY_END, .. }));
    }

    // ── Exact modifier semantics ──────────────────────────────────────────────

    #[test]
    fn test_rule_without_source_modifiers_never_fires_with_user_modifiers_held() {
        let rules = [rule(RuleDraft::discard(KEY_HOME))];
        for held in [
            ModifierFlags::SHIFT,
            ModifierFlags::CONTROL,
            ModifierFlags::OPTION,
            ModifierFlags::COMMAND,
            ModifierFlags::SHIFT | ModifierFlags::COMMAND,
        ] {
            assert_eq!(
                match_event(KEY_HOME, held, None, true, &rules),
                Action::PassThrough,
                "bare rule must not fire with {held} held"
            );
        }
    }

    #[test]
    fn test_caps_lock_state_does_not_block_bare_rule() {
        let rules = [rule(RuleDraft::discard(KEY_HOME))];
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::CAPS_LOCK, None, true, &rules),
            Action::Discard
        );
    }

    #[test]
    fn test_source_modifiers_require_exact_set_not_superset() {
        // Arrange – rule wants exactly Shift
        let rules = [rule(
            RuleDraft::discard(KEY_HOME).with_source_modifiers(ModifierFlags::SHIFT),
        )];

        // Assert
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::SHIFT, None, true, &rules),
            Action::Discard
        );
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::SHIFT | ModifierFlags::COMMAND, None, true, &rules),
            Action::PassThrough
        );
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, None, true, &rules),
            Action::PassThrough
        );
    }

    #[test]
    fn test_device_dependent_flag_bits_are_ignored() {
        // Arrange – Shift plus the NX_DEVICELSHIFTKEYMASK bit (0x02)
        let rules = [rule(
            RuleDraft::discard(KEY_HOME).with_source_modifiers(ModifierFlags::SHIFT),
        )];
        let flags = ModifierFlags::SHIFT | ModifierFlags(0x02);

        // Act / Assert
        assert_eq!(match_event(KEY_HOME, flags, None, true, &rules), Action::Discard);
    }

    // ── Targets ───────────────────────────────────────────────────────────────

    #[test]
    fn test_discard_sentinel_always_discards() {
        let mut r = rule(RuleDraft::discard(KEY_CAPS_LOCK));
        r.target_key_name = "Something Else".to_string();
        assert_eq!(
            match_event(KEY_CAPS_LOCK, ModifierFlags::NONE, None, false, &[r]),
            Action::Discard
        );
    }

    #[test]
    fn test_remap_without_target_modifiers_preserves_event_flags() {
        // Arrange – plain swap with a Shift-required source
        let rules = [rule(
            RuleDraft::key_swap(KEY_HOME, KEY_END).with_source_modifiers(ModifierFlags::SHIFT),
        )];
        let flags = ModifierFlags::SHIFT | ModifierFlags::CAPS_LOCK;

        // Act
        let action = match_event(KEY_HOME, flags, None, true, &rules);

        // Assert – the original flags, Caps Lock bit included, are carried over
        assert_eq!(
            action,
            Action::Remap {
                key_code: KEY_END,
                modifiers: flags
            }
        );
    }

    #[test]
    fn test_swap_onto_key_code_zero_keeps_held_modifiers_like_any_other_target() {
        // Arrange – kVK_ANSI_A shares key code 0 with the discard sentinel
        let to_a = [rule(
            RuleDraft::key_swap(KEY_X, KEY_A).with_source_modifiers(ModifierFlags::SHIFT),
        )];
        let to_b = [rule(
            RuleDraft::key_swap(KEY_X, KEY_B).with_source_modifiers(ModifierFlags::SHIFT),
        )];
        let held = ModifierFlags::SHIFT | ModifierFlags::CAPS_LOCK;

        // Act
        let a = match_event(KEY_X, held, None, true, &to_a);
        let b = match_event(KEY_X, held, None, true, &to_b);

        // Assert – both targets receive Shift
        let modifiers_of = |action: Action| match action {
            Action::Remap { modifiers, .. } => modifiers.user_bits(),
            other => panic!("expected a remap, got {other:?}"),
        };
        assert_eq!(modifiers_of(a), ModifierFlags::SHIFT);
        assert_eq!(modifiers_of(b), ModifierFlags::SHIFT);
    }

    #[test]
    fn test_remap_with_target_modifiers_uses_fixed_modifiers() {
        let rules = [rule(
            RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW)
                .with_target_modifiers(ModifierFlags::COMMAND),
        )];
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, None, true, &rules),
            Action::Remap {
                key_code: KEY_LEFT_ARROW,
                modifiers: ModifierFlags::COMMAND
            }
        );
    }

    #[test]
    fn test_key_up_gets_same_decision_as_key_down() {
        let rules = [rule(
            RuleDraft::key_swap(KEY_HOME, KEY_LEFT_ARROW)
                .with_target_modifiers(ModifierFlags::COMMAND),
        )];
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, None, true, &rules),
            match_event(KEY_HOME, ModifierFlags::NONE, None, false, &rules),
        );
    }

    // ── App filters ───────────────────────────────────────────────────────────

    #[test]
    fn test_include_rule_never_fires_outside_filtered_apps() {
        let rules = [rule(
            RuleDraft::discard(KEY_HOME).with_app_filter(AppFilterMode::Include, ["app.editor"]),
        )];
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, Some("app.browser"), true, &rules),
            Action::PassThrough
        );
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, None, true, &rules),
            Action::PassThrough
        );
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, Some("app.editor"), true, &rules),
            Action::Discard
        );
    }

    #[test]
    fn test_exclude_rule_never_fires_inside_filtered_apps() {
        let rules = [rule(
            RuleDraft::discard(KEY_HOME).with_app_filter(AppFilterMode::Exclude, ["app.editor"]),
        )];
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, Some("app.editor"), true, &rules),
            Action::PassThrough
        );
        assert_eq!(
            match_event(KEY_HOME, ModifierFlags::NONE, Some("app.browser"), true, &rules),
            Action::Discard
        );
    }
}
