//! Storage infrastructure: configuration and rule persistence.
//!
//! - `config` reads the TOML agent settings from the platform config
//!   directory, with defaults for a first run.
//! - `rules_file` is the JSON-backed
//!   [`RuleRepository`](crate::application::manage_rules::RuleRepository)
//!   plus the tolerant loader that validates each stored rule.

pub mod config;
pub mod rules_file;
