//! End-to-end scenarios for the agent, minus the OS.
//!
//! Rules go in through the `RuleStore` (backed by a real `rules.json` in a
//! temp directory), events go in through the `EventPipeline` the way the
//! event tap delivers them, and the test inspects the disposition the tap
//! would act on.

use std::path::PathBuf;
use std::sync::Arc;

use keyswap_agent::application::app_context::AppContextTracker;
use keyswap_agent::application::handle_event::{EventPipeline, TapDisableReason, TapEvent};
use keyswap_agent::application::manage_rules::RuleStore;
use keyswap_agent::application::synthesize::{
    Disposition, KeyEventFactory, SynthesisError, SyntheticKeyEvent,
};
use keyswap_agent::infrastructure::storage::rules_file::JsonRulesFile;
use keyswap_core::domain::catalog::lookup;
use keyswap_core::keymap::macos_cg::{KEY_A, KEY_B, KEY_CAPS_LOCK, KEY_HOME, KEY_LEFT_ARROW};
use keyswap_core::{AppFilterMode, ModifierFlags, Rule, RuleDraft};
use serde_json::json;
use uuid::Uuid;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Hands back the requested event so the test can read it.
struct EchoFactory;

impl KeyEventFactory for EchoFactory {
    type Event = SyntheticKeyEvent;

    fn create_key_event(&self, event: SyntheticKeyEvent) -> Result<SyntheticKeyEvent, SynthesisError> {
        Ok(event)
    }
}

struct Harness {
    dir: PathBuf,
    store: RuleStore<JsonRulesFile>,
    app_context: Arc<AppContextTracker>,
    pipeline: EventPipeline<EchoFactory>,
}

impl Harness {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("keyswap_scenario_{}", Uuid::new_v4()));
        let store = RuleStore::new(JsonRulesFile::new(dir.join("rules.json")), Vec::new());
        let app_context = Arc::new(AppContextTracker::new());
        let pipeline =
            EventPipeline::new(store.snapshot_handle(), Arc::clone(&app_context), EchoFactory);
        Self {
            dir,
            store,
            app_context,
            pipeline,
        }
    }

    fn key_down(&self, key_code: u16, flags: ModifierFlags) -> Disposition<SyntheticKeyEvent> {
        self.pipeline.handle(TapEvent::KeyDown { key_code, flags })
    }

    fn key_up(&self, key_code: u16, flags: ModifierFlags) -> Disposition<SyntheticKeyEvent> {
        self.pipeline.handle(TapEvent::KeyUp { key_code, flags })
    }

    fn caps_lock(&self, active: bool) -> Disposition<SyntheticKeyEvent> {
        let flags = if active {
            ModifierFlags::CAPS_LOCK
        } else {
            ModifierFlags::NONE
        };
        self.pipeline.handle(TapEvent::FlagsChanged {
            key_code: KEY_CAPS_LOCK,
            flags,
        })
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn replaced(key_code: u16, modifiers: ModifierFlags, is_key_down: bool) -> Disposition<SyntheticKeyEvent> {
    Disposition::Replace(SyntheticKeyEvent {
        key_code,
        modifiers,
        is_key_down,
    })
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_home_becomes_command_left_arrow_and_shift_home_passes_through() {
    // Arrange
    let harness = Harness::new();
    let draft = lookup("line_start").expect("catalog entry").to_draft(KEY_HOME, None);
    harness.store.add(Rule::from_draft(draft)).expect("add");

    // Act
    let plain_down = harness.key_down(KEY_HOME, ModifierFlags::NONE);
    let plain_up = harness.key_up(KEY_HOME, ModifierFlags::NONE);
    let shifted = harness.key_down(KEY_HOME, ModifierFlags::SHIFT);

    // Assert
    assert_eq!(plain_down, replaced(KEY_LEFT_ARROW, ModifierFlags::COMMAND, true));
    assert_eq!(plain_up, replaced(KEY_LEFT_ARROW, ModifierFlags::COMMAND, false));
    assert_eq!(shifted, replaced(KEY_HOME, ModifierFlags::SHIFT, true));
}

#[test]
fn test_caps_lock_discard_blocks_activation_and_deactivation() {
    // Arrange
    let harness = Harness::new();
    harness
        .store
        .add(Rule::from_draft(RuleDraft::discard(KEY_CAPS_LOCK)))
        .expect("add");

    // Act
    let on = harness.caps_lock(true);
    let off = harness.caps_lock(false);

    // Assert
    assert_eq!(on, Disposition::Consume);
    assert_eq!(off, Disposition::Consume);
    assert_eq!(harness.pipeline.stats().events_discarded, 2);
}

#[test]
fn test_caps_lock_remap_yields_one_down_then_one_up() {
    // Arrange
    let harness = Harness::new();
    harness
        .store
        .add(Rule::from_draft(RuleDraft::key_swap(KEY_CAPS_LOCK, KEY_B)))
        .expect("add");

    // Act: repeated flag reports without a lock change synthesise nothing.
    let on = harness.caps_lock(true);
    let repeat = harness.caps_lock(true);
    let off = harness.caps_lock(false);

    // Assert
    assert_eq!(on, replaced(KEY_B, ModifierFlags::NONE, true));
    assert_eq!(repeat, Disposition::Forward);
    assert_eq!(off, replaced(KEY_B, ModifierFlags::NONE, false));
}

#[test]
fn test_include_filter_follows_frontmost_app() {
    // Arrange
    let harness = Harness::new();
    harness
        .store
        .add(Rule::from_draft(
            RuleDraft::key_swap(KEY_A, KEY_B).with_app_filter(AppFilterMode::Include, ["app.editor"]),
        ))
        .expect("add");

    // Act
    harness.app_context.set_frontmost(Some("app.editor"));
    let in_editor = harness.key_down(KEY_A, ModifierFlags::NONE);
    harness.app_context.set_frontmost(Some("app.browser"));
    let in_browser = harness.key_down(KEY_A, ModifierFlags::NONE);
    harness.app_context.set_frontmost(None);
    let unknown = harness.key_down(KEY_A, ModifierFlags::NONE);

    // Assert
    assert_eq!(in_editor, replaced(KEY_B, ModifierFlags::NONE, true));
    assert_eq!(in_browser, replaced(KEY_A, ModifierFlags::NONE, true));
    assert_eq!(unknown, replaced(KEY_A, ModifierFlags::NONE, true));
}

#[test]
fn test_disabling_a_rule_takes_effect_on_the_next_event() {
    // Arrange
    let harness = Harness::new();
    let id = harness
        .store
        .add(Rule::from_draft(RuleDraft::discard(KEY_A)))
        .expect("add");
    assert_eq!(harness.key_down(KEY_A, ModifierFlags::NONE), Disposition::Consume);

    // Act
    harness.store.toggle_enabled(id).expect("toggle");

    // Assert
    assert_eq!(
        harness.key_down(KEY_A, ModifierFlags::NONE),
        replaced(KEY_A, ModifierFlags::NONE, true)
    );
}

#[test]
fn test_tap_disabled_is_reenabled_not_dropped() {
    let harness = Harness::new();

    let result = harness.pipeline.handle(TapEvent::TapDisabled {
        reason: TapDisableReason::Timeout,
    });

    assert_eq!(result, Disposition::ReEnableAndForward);
    assert_eq!(harness.pipeline.stats().tap_reenables, 1);
}

#[test]
fn test_rules_survive_a_restart_in_order() {
    // Arrange
    let harness = Harness::new();
    let first = harness
        .store
        .add(Rule::from_draft(RuleDraft::key_swap(KEY_HOME, KEY_A)))
        .expect("add");
    let second = harness
        .store
        .add(Rule::from_draft(RuleDraft::discard(KEY_B)))
        .expect("add");
    harness.store.move_rule(second, 0).expect("move");

    // Act
    let reloaded = JsonRulesFile::new(harness.dir.join("rules.json"))
        .load()
        .expect("load");

    // Assert
    let ids: Vec<_> = reloaded.rules.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second, first]);
    assert_eq!(reloaded.rules, harness.store.all());
}

#[test]
fn test_loading_drops_the_one_invalid_entry() {
    // Arrange: one entry has both an empty source name and an out-of-range code.
    let dir = std::env::temp_dir().join(format!("keyswap_scenario_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("rules.json");
    let entry = |source: u16, name: &str| {
        json!({
            "id": Uuid::new_v4(),
            "kind": "KeySwap",
            "sourceKeyCode": source,
            "sourceKeyName": name,
            "targetKeyCode": KEY_B,
            "targetKeyName": "B",
            "isEnabled": true,
            "appFilterMode": "All",
            "filteredApps": []
        })
    };
    let content = json!([entry(KEY_A, "A"), entry(0x1FF, ""), entry(KEY_HOME, "Home")]);
    std::fs::write(&path, content.to_string()).unwrap();

    // Act
    let report = JsonRulesFile::new(&path).load().expect("load");

    // Assert
    assert_eq!(report.rules.len(), 2);
    assert_eq!(report.dropped, 1);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_revision_watch_wakes_an_async_observer() {
    // Arrange
    let harness = Harness::new();
    let mut revisions = harness.store.subscribe();

    // Act
    harness
        .store
        .add(Rule::from_draft(RuleDraft::discard(KEY_A)))
        .expect("add");

    // Assert
    tokio_test::block_on(async {
        revisions.changed().await.expect("sender alive");
    });
    assert_eq!(*revisions.borrow(), 1);
}
