//! JSON persistence for the rule list.
//!
//! The file is a single JSON array of camelCase rule records, in store
//! order.  Saves replace the whole file atomically: the new content goes to
//! a sibling temp file which is then renamed over the old one, so a crash
//! mid-write leaves either the old or the new list, never a mix.
//!
//! Loading is tolerant.  Each array element is validated on its own and
//! invalid ones are dropped (and counted) instead of failing the whole load,
//! so one hand-edited typo does not cost the user every other rule.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use keyswap_core::{KeyMapper, Rule};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::manage_rules::{RuleRepository, RuleStore};

#[derive(Debug, Error)]
pub enum RulesFileError {
    #[error("I/O error accessing rules at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The file exists but is not a JSON array.
    #[error("rules file {0} is not a JSON array")]
    CorruptPersistedState(PathBuf),
}

/// Result of loading the rules file.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Valid rules in file order.
    pub rules: Vec<Rule>,
    /// Number of entries that were skipped.
    pub dropped: usize,
}

/// The `rules.json` file backing a [`RuleStore`](crate::application::manage_rules::RuleStore).
#[derive(Debug, Clone)]
pub struct JsonRulesFile {
    path: PathBuf,
}

impl JsonRulesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time, or `None` if the file does not exist.
    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    /// Reads and validates the file.  A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// [`RulesFileError::Io`] for read failures other than "not found" and
    /// [`RulesFileError::CorruptPersistedState`] when the content is not a
    /// JSON array.
    pub fn load(&self) -> Result<LoadReport, RulesFileError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no rules file yet");
                return Ok(LoadReport::default());
            }
            Err(source) => {
                return Err(RulesFileError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let entries: Vec<Value> = serde_json::from_str(&content)
            .map_err(|_| RulesFileError::CorruptPersistedState(self.path.clone()))?;

        let report = parse_entries(entries);
        if report.dropped > 0 {
            warn!(
                path = %self.path.display(),
                dropped = report.dropped,
                "dropped invalid rule entries"
            );
        }
        Ok(report)
    }

    /// Like [`load`](Self::load), but a corrupt file is logged and treated
    /// as empty.  The file is left in place for the next save to overwrite.
    ///
    /// # Errors
    ///
    /// Only [`RulesFileError::Io`].
    pub fn load_or_recover(&self) -> Result<LoadReport, RulesFileError> {
        match self.load() {
            Err(RulesFileError::CorruptPersistedState(path)) => {
                warn!(path = %path.display(), "rules file is corrupt; starting with no rules");
                Ok(LoadReport::default())
            }
            other => other,
        }
    }

    /// Re-reads the file into `store` after an outside edit.
    ///
    /// Valid entries replace the live list as [`load`](Self::load) would
    /// return them.  A file that is not a JSON array leaves `store`
    /// untouched; the next save writes the live list back over it.
    ///
    /// # Errors
    ///
    /// Only [`RulesFileError::Io`].
    pub fn reload_into<R: RuleRepository>(&self, store: &RuleStore<R>) -> Result<(), RulesFileError> {
        match self.load() {
            Ok(report) => {
                store.replace_all(report.rules);
                Ok(())
            }
            Err(RulesFileError::CorruptPersistedState(path)) => {
                warn!(path = %path.display(), "rules file is corrupt; keeping the current rules");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Writes `rules` as a pretty-printed JSON array via temp file + rename.
    ///
    /// # Errors
    ///
    /// [`RulesFileError::Io`] or [`RulesFileError::Serialize`].
    pub fn write(&self, rules: &[Rule]) -> Result<(), RulesFileError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| RulesFileError::Io { path, source }
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        }

        let content = serde_json::to_vec_pretty(rules)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
            file.write_all(&content).map_err(io_err(&tmp_path))?;
            file.sync_all().map_err(io_err(&tmp_path))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(io_err(&self.path))?;
        debug!(path = %self.path.display(), count = rules.len(), "rules saved");
        Ok(())
    }
}

impl RuleRepository for JsonRulesFile {
    fn save(&self, rules: &[Rule]) -> Result<(), String> {
        self.write(rules).map_err(|e| e.to_string())
    }
}

/// Validates each raw entry, keeping the valid ones in order.
fn parse_entries(entries: Vec<Value>) -> LoadReport {
    let mut report = LoadReport::default();
    let mut seen = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        match parse_entry(entry) {
            Ok(rule) if seen.insert(rule.id) => report.rules.push(rule),
            Ok(rule) => {
                debug!(index, id = %rule.id, "dropping rule with duplicate id");
                report.dropped += 1;
            }
            Err(reason) => {
                debug!(index, %reason, "dropping invalid rule entry");
                report.dropped += 1;
            }
        }
    }
    report
}

fn parse_entry(mut entry: Value) -> Result<Rule, String> {
    backfill_source_name(&mut entry);
    let mut rule: Rule = serde_json::from_value(entry).map_err(|e| e.to_string())?;
    rule.normalize();
    rule.validate().map_err(|e| e.to_string())?;
    Ok(rule)
}

/// Rules saved before `sourceKeyName` existed get the key table's name.
/// An explicitly empty name is left alone so validation rejects it.
fn backfill_source_name(entry: &mut Value) {
    let Some(object) = entry.as_object_mut() else {
        return;
    };
    if object.contains_key("sourceKeyName") {
        return;
    }
    let Some(code) = object
        .get("sourceKeyCode")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
    else {
        return;
    };
    object.insert(
        "sourceKeyName".to_string(),
        Value::String(KeyMapper::key_name_or_hex(code)),
    );
}
