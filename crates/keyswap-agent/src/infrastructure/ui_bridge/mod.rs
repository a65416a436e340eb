//! Command bridge: exposes application-layer operations to a front end.
//!
//! Every function here takes the shared [`AppState`] and returns a
//! [`CommandResult`].  The `keyswap` CLI is the consumer in this repository;
//! a settings window would call the same functions.  The Application and
//! Domain layers must NOT import this module.
//!
//! # Data Transfer Objects (DTOs)
//!
//! Internal types (`RuleId`, `ModifierFlags`, `BTreeSet`) are converted to
//! plain JSON-friendly structs (`RuleDto`, `CatalogEntryDto`, …) at this
//! boundary.  Incoming edits arrive as [`RuleInputDto`], which names keys by
//! display name or number and targets by key, catalog action, or discard.
//!
//! # `CommandResult<T>` wrapper
//!
//! All commands return `CommandResult<T>` rather than `Result<T, E>`, so every
//! response has the same shape: `{ success: bool, data: T | null, error:
//! string | null }`.

use std::sync::Arc;

use keyswap_core::domain::catalog::{self, CatalogEntry, CATALOG_VERSION};
use keyswap_core::{
    AppFilterMode, KeyMapper, ModifierFlags, Rule, RuleDraft, RuleId, RuleKind, CATALOG,
};
use serde::{Deserialize, Serialize};

use crate::application::handle_event::{PipelineControl, PipelineStats};
use crate::application::manage_rules::{RuleRepository, RuleStore};
use crate::application::permission_watch::PermissionView;
use crate::infrastructure::permission::PermissionProbe;
use crate::infrastructure::storage::rules_file::JsonRulesFile;

// ── Shared application state ──────────────────────────────────────────────────

/// The rule store type the bridge works with.
pub type SharedRuleStore = RuleStore<Box<dyn RuleRepository>>;

/// Handles into a running agent.  Absent when only editing rules.
pub struct AgentHandles {
    pub pipeline: Arc<dyn PipelineControl>,
    pub permission: Arc<dyn PermissionView>,
}

/// State shared by all commands.
///
/// No outer lock: the rule store serialises its own mutations, and the
/// pipeline and monitor expose only atomic state.
pub struct AppState {
    pub rules: SharedRuleStore,
    probe: Box<dyn PermissionProbe>,
    agent: Option<AgentHandles>,
}

impl AppState {
    /// State for editing rules without a running tap.
    pub fn new(rules: SharedRuleStore, probe: Box<dyn PermissionProbe>) -> Self {
        Self {
            rules,
            probe,
            agent: None,
        }
    }

    /// State whose rule store saves to `rules_file`, starting from `rules`.
    pub fn open(rules_file: JsonRulesFile, rules: Vec<Rule>, probe: Box<dyn PermissionProbe>) -> Self {
        let repository: Box<dyn RuleRepository> = Box::new(rules_file);
        Self::new(RuleStore::new(repository, rules), probe)
    }

    /// Attaches a running agent so status and suspend/resume work.
    pub fn with_agent(mut self, agent: AgentHandles) -> Self {
        self.agent = Some(agent);
        self
    }
}

// ── Data Transfer Objects (Presentation layer) ────────────────────────────────

/// One stored rule as shown in the rule list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDto {
    pub id: String,
    pub kind: RuleKind,
    pub source_key_code: u16,
    pub source_key_name: String,
    pub source_modifiers: Option<u64>,
    pub target_key_code: u16,
    pub target_key_name: String,
    pub target_modifiers: Option<u64>,
    pub is_enabled: bool,
    pub app_filter_mode: AppFilterMode,
    pub filtered_apps: Vec<String>,
    pub is_discard: bool,
    /// Human-readable one-line summary.
    pub summary: String,
}

impl From<&Rule> for RuleDto {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.to_string(),
            kind: rule.kind,
            source_key_code: rule.source_key_code,
            source_key_name: rule.source_key_name.clone(),
            source_modifiers: rule.source_modifiers.map(ModifierFlags::bits),
            target_key_code: rule.target_key_code,
            target_key_name: rule.target_key_name.clone(),
            target_modifiers: rule.target_modifiers.map(ModifierFlags::bits),
            is_enabled: rule.is_enabled,
            app_filter_mode: rule.app_filter_mode,
            filtered_apps: rule.filtered_apps.iter().cloned().collect(),
            is_discard: rule.is_discard(),
            summary: rule.to_string(),
        }
    }
}

/// What a new or edited rule produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTargetDto {
    /// A key, by display name or code, with optional fixed modifiers.
    Key {
        key: String,
        #[serde(default)]
        modifiers: Option<u64>,
    },
    /// A catalog action by id, e.g. `"line_start"`.
    Action { action_id: String },
    /// Block the source key.
    Discard,
}

/// A rule as submitted by the editor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleInputDto {
    /// Source key by display name (`"Home"`) or code (`"115"`, `"0x73"`).
    pub source_key: String,
    /// Exact modifiers required on the source key; `None` means none held.
    #[serde(default)]
    pub source_modifiers: Option<u64>,
    pub target: RuleTargetDto,
    #[serde(default)]
    pub app_filter_mode: AppFilterMode,
    #[serde(default)]
    pub filtered_apps: Vec<String>,
    /// On add: defaults to enabled.  On update: `None` keeps the current value.
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

impl RuleInputDto {
    /// Resolves names and ids into a [`RuleDraft`].
    pub fn to_draft(&self) -> Result<RuleDraft, String> {
        let source = parse_key(&self.source_key)?;
        let source_modifiers = self.source_modifiers.map(ModifierFlags::from_bits);

        let with_source = |draft: RuleDraft| match source_modifiers {
            Some(modifiers) => draft.with_source_modifiers(modifiers),
            None => draft,
        };

        let draft = match &self.target {
            RuleTargetDto::Key { key, modifiers } => {
                let draft = with_source(RuleDraft::key_swap(source, parse_key(key)?));
                match modifiers {
                    Some(bits) => draft.with_target_modifiers(ModifierFlags::from_bits(*bits)),
                    None => draft,
                }
            }
            RuleTargetDto::Action { action_id } => catalog::lookup(action_id)
                .ok_or_else(|| format!("unknown action id: {action_id}"))?
                .to_draft(source, source_modifiers),
            RuleTargetDto::Discard => with_source(RuleDraft::discard(source)),
        };

        Ok(draft.with_app_filter(self.app_filter_mode, self.filtered_apps.iter().cloned()))
    }
}

/// One entry of the action picker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntryDto {
    pub id: String,
    pub name: String,
    pub category: String,
    pub key_code: u16,
    pub modifiers: Option<u64>,
    /// Shortcut as glyphs, e.g. `⌘←`.
    pub shortcut: String,
}

impl From<&CatalogEntry> for CatalogEntryDto {
    fn from(entry: &CatalogEntry) -> Self {
        let shortcut = if entry.is_discard() {
            String::new()
        } else {
            format!(
                "{}{}",
                entry.modifiers.unwrap_or_default(),
                KeyMapper::key_name_or_hex(entry.key_code)
            )
        };
        Self {
            id: entry.id.to_string(),
            name: entry.name.to_string(),
            category: format!("{:?}", entry.category),
            key_code: entry.key_code,
            modifiers: entry.modifiers.map(ModifierFlags::bits),
            shortcut,
        }
    }
}

/// The action catalog with its version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogDto {
    pub version: u32,
    pub entries: Vec<CatalogEntryDto>,
}

/// Agent health as shown in the status view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatus {
    /// Accessibility trust.
    pub trusted: bool,
    /// Whether the event tap is installed.
    pub running: bool,
    pub suspended: bool,
    pub rule_count: usize,
    pub enabled_rule_count: usize,
    pub stats: PipelineStats,
}

/// Unified response wrapper used by all commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

fn parse_key(input: &str) -> Result<u16, String> {
    KeyMapper::parse_key(input).ok_or_else(|| format!("unknown key: {input}"))
}

fn parse_id(id: &str) -> Result<RuleId, String> {
    id.parse::<RuleId>()
        .map_err(|e| format!("invalid rule id {id:?}: {e}"))
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Returns every rule in match order.
pub fn list_rules(state: &AppState) -> CommandResult<Vec<RuleDto>> {
    CommandResult::ok(state.rules.all().iter().map(RuleDto::from).collect())
}

/// Appends a new rule.
pub fn add_rule(state: &AppState, input: RuleInputDto) -> CommandResult<RuleDto> {
    let draft = match input.to_draft() {
        Ok(draft) => draft,
        Err(e) => return CommandResult::err(e),
    };
    let mut rule = Rule::from_draft(draft);
    if let Some(enabled) = input.is_enabled {
        rule.is_enabled = enabled;
    }
    let dto = RuleDto::from(&rule);
    match state.rules.add(rule) {
        Ok(_) => CommandResult::ok(dto),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// Replaces the editable fields of rule `id`.
pub fn update_rule(state: &AppState, id: &str, input: RuleInputDto) -> CommandResult<RuleDto> {
    let result = parse_id(id).and_then(|id| {
        let draft = input.to_draft()?;
        state
            .rules
            .update(id, draft, input.is_enabled)
            .map_err(|e| e.to_string())
    });
    match result {
        Ok(rule) => CommandResult::ok(RuleDto::from(&rule)),
        Err(e) => CommandResult::err(e),
    }
}

/// Deletes rule `id`, returning what was removed.
pub fn delete_rule(state: &AppState, id: &str) -> CommandResult<RuleDto> {
    match parse_id(id).and_then(|id| state.rules.delete(id).map_err(|e| e.to_string())) {
        Ok(rule) => CommandResult::ok(RuleDto::from(&rule)),
        Err(e) => CommandResult::err(e),
    }
}

/// Flips rule `id` and returns its new enabled state.
pub fn toggle_rule(state: &AppState, id: &str) -> CommandResult<bool> {
    match parse_id(id).and_then(|id| state.rules.toggle_enabled(id).map_err(|e| e.to_string())) {
        Ok(enabled) => CommandResult::ok(enabled),
        Err(e) => CommandResult::err(e),
    }
}

/// Moves rule `id` to position `new_index` in match order.
pub fn move_rule(state: &AppState, id: &str, new_index: usize) -> CommandResult<()> {
    match parse_id(id).and_then(|id| {
        state
            .rules
            .move_rule(id, new_index)
            .map_err(|e| e.to_string())
    }) {
        Ok(()) => CommandResult::ok(()),
        Err(e) => CommandResult::err(e),
    }
}

/// Reports trust, tap state, suspension and counters.
///
/// Without a running agent, trust is queried directly and the rest reads as
/// idle.
pub fn get_status(state: &AppState) -> CommandResult<AgentStatus> {
    let rules = state.rules.all();
    let enabled_rule_count = rules.iter().filter(|r| r.is_enabled).count();

    let (trusted, running, suspended, stats) = match &state.agent {
        Some(agent) => {
            let permission = agent.permission.status();
            (
                permission.trusted,
                permission.running,
                agent.pipeline.is_suspended(),
                agent.pipeline.stats(),
            )
        }
        None => (state.probe.is_trusted(), false, false, PipelineStats::default()),
    };

    CommandResult::ok(AgentStatus {
        trusted,
        running,
        suspended,
        rule_count: rules.len(),
        enabled_rule_count,
        stats,
    })
}

/// Passes every key through untouched until [`resume`].
pub fn suspend(state: &AppState) -> CommandResult<()> {
    match &state.agent {
        Some(agent) => {
            agent.pipeline.suspend();
            CommandResult::ok(())
        }
        None => CommandResult::err("agent is not running"),
    }
}

pub fn resume(state: &AppState) -> CommandResult<()> {
    match &state.agent {
        Some(agent) => {
            agent.pipeline.resume();
            CommandResult::ok(())
        }
        None => CommandResult::err("agent is not running"),
    }
}

/// Returns the named actions a rule can target.
pub fn list_catalog() -> CommandResult<CatalogDto> {
    CommandResult::ok(CatalogDto {
        version: CATALOG_VERSION,
        entries: CATALOG.iter().map(CatalogEntryDto::from).collect(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
