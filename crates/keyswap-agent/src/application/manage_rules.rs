//! RuleStore: the ordered, persisted list of remap rules.
//!
//! The store is the only writer of the rule list.  After every successful
//! mutation it:
//!
//! 1. publishes a fresh snapshot of the *enabled* rules, in stored order, for
//!    the event-tap thread to read without locking the list;
//! 2. saves the whole list through its [`RuleRepository`];
//! 3. bumps a revision counter that observers can [`RuleStore::subscribe`] to.
//!
//! A save failure is returned to the caller but does not roll the in-memory
//! change back: remapping keeps working with what the user asked for, and the
//! next successful save writes the complete list anyway.

use std::sync::Arc;

use keyswap_core::{Rule, RuleDraft, RuleError, RuleId};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use super::snapshot::SnapshotCell;

/// The enabled-rules snapshot shared with the event pipeline.
pub type RuleSnapshot = SnapshotCell<Arc<[Rule]>>;

/// Error type for rule store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no rule with id {0}")]
    NotFound(RuleId),

    #[error("a rule with id {0} already exists")]
    DuplicateId(RuleId),

    #[error("invalid rule: {0}")]
    Invalid(#[from] RuleError),

    /// The change was applied in memory but could not be written to disk.
    #[error("failed to persist rules: {0}")]
    Persist(String),
}

/// Durable storage for the full rule list.
///
/// The production implementation writes a JSON file; tests record saves.
pub trait RuleRepository: Send + Sync {
    /// Replaces the stored list with `rules`, preserving order.
    fn save(&self, rules: &[Rule]) -> Result<(), String>;
}

impl<R: RuleRepository + ?Sized> RuleRepository for Box<R> {
    fn save(&self, rules: &[Rule]) -> Result<(), String> {
        (**self).save(rules)
    }
}

/// Ordered CRUD over the rule list.
pub struct RuleStore<R: RuleRepository> {
    rules: Mutex<Vec<Rule>>,
    snapshot: Arc<RuleSnapshot>,
    repository: R,
    revision: watch::Sender<u64>,
}

fn enabled_rules(rules: &[Rule]) -> Arc<[Rule]> {
    rules.iter().filter(|r| r.is_enabled).cloned().collect()
}

impl<R: RuleRepository> RuleStore<R> {
    /// Creates a store over an already-loaded (and validated) rule list.
    pub fn new(repository: R, rules: Vec<Rule>) -> Self {
        let snapshot = Arc::new(SnapshotCell::new(enabled_rules(&rules)));
        let (revision, _) = watch::channel(0);
        Self {
            rules: Mutex::new(rules),
            snapshot,
            repository,
            revision,
        }
    }

    /// Returns the cell the event pipeline reads enabled rules from.
    pub fn snapshot_handle(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Returns a receiver whose value increases after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Returns a copy of every rule, in stored order.
    pub fn all(&self) -> Vec<Rule> {
        self.rules.lock().clone()
    }

    /// Returns the currently published enabled-rules snapshot.
    pub fn enabled_snapshot(&self) -> Arc<[Rule]> {
        self.snapshot.load()
    }

    pub fn get(&self, id: RuleId) -> Option<Rule> {
        self.rules.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Appends `rule` to the end of the list.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] or [`StoreError::DuplicateId`] leave the list
    /// untouched; [`StoreError::Persist`] means the rule was added but not
    /// saved.
    pub fn add(&self, mut rule: Rule) -> Result<RuleId, StoreError> {
        rule.normalize();
        rule.validate()?;
        let id = rule.id;

        let mut rules = self.rules.lock();
        if rules.iter().any(|r| r.id == id) {
            return Err(StoreError::DuplicateId(id));
        }
        info!(%id, rule = %rule, "adding rule");
        rules.push(rule);
        self.commit(&rules)?;
        Ok(id)
    }

    /// Replaces the editable fields of rule `id` with `draft`.
    ///
    /// The id is kept.  `is_enabled` is kept unless `enabled` is `Some`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] or [`StoreError::Invalid`] leave the rule
    /// unchanged.
    pub fn update(
        &self,
        id: RuleId,
        draft: RuleDraft,
        enabled: Option<bool>,
    ) -> Result<Rule, StoreError> {
        let mut rules = self.rules.lock();
        let index = position(&rules, id)?;

        let mut edited = rules[index].clone();
        edited.apply_draft(draft);
        if let Some(enabled) = enabled {
            edited.is_enabled = enabled;
        }
        edited.validate()?;

        info!(%id, rule = %edited, "updating rule");
        rules[index] = edited.clone();
        self.commit(&rules)?;
        Ok(edited)
    }

    /// Removes rule `id` and returns it.
    pub fn delete(&self, id: RuleId) -> Result<Rule, StoreError> {
        let mut rules = self.rules.lock();
        let index = position(&rules, id)?;
        let removed = rules.remove(index);
        info!(%id, rule = %removed, "deleted rule");
        self.commit(&rules)?;
        Ok(removed)
    }

    /// Flips `is_enabled` on rule `id` and returns the new value.
    pub fn toggle_enabled(&self, id: RuleId) -> Result<bool, StoreError> {
        let mut rules = self.rules.lock();
        let index = position(&rules, id)?;
        let rule = &mut rules[index];
        rule.is_enabled = !rule.is_enabled;
        let now_enabled = rule.is_enabled;
        info!(%id, enabled = now_enabled, "toggled rule");
        self.commit(&rules)?;
        Ok(now_enabled)
    }

    /// Moves rule `id` to `new_index`, shifting the rules in between.  An
    /// index past the end moves the rule to the end.
    pub fn move_rule(&self, id: RuleId, new_index: usize) -> Result<(), StoreError> {
        let mut rules = self.rules.lock();
        let from = position(&rules, id)?;
        let to = new_index.min(rules.len() - 1);
        if from == to {
            return Ok(());
        }
        let rule = rules.remove(from);
        rules.insert(to, rule);
        info!(%id, from, to, "moved rule");
        self.commit(&rules)
    }

    /// Replaces the whole list with `rules` read back from storage, e.g.
    /// after another process edited the file.  Publishes and bumps the
    /// revision without saving.
    pub fn replace_all(&self, rules: Vec<Rule>) {
        let mut current = self.rules.lock();
        if *current == rules {
            return;
        }
        info!(count = rules.len(), "reloaded rules from storage");
        *current = rules;
        self.snapshot.publish(enabled_rules(&current));
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Publishes the snapshot, saves, and bumps the revision.  Runs with the
    /// list lock held so saves happen in mutation order.
    fn commit(&self, rules: &[Rule]) -> Result<(), StoreError> {
        self.snapshot.publish(enabled_rules(rules));
        self.revision.send_modify(|rev| *rev += 1);

        self.repository.save(rules).map_err(|e| {
            warn!("rule list changed in memory but was not saved: {e}");
            StoreError::Persist(e)
        })
    }
}

fn position(rules: &[Rule], id: RuleId) -> Result<usize, StoreError> {
    rules
        .iter()
        .position(|r| r.id == id)
        .ok_or(StoreError::NotFound(id))
}
