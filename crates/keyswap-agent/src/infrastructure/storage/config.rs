//! TOML-based configuration persistence for the Keyswap agent.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - macOS:    `~/Library/Application Support/Keyswap/config.toml`
//! - Linux:    `~/.config/keyswap/config.toml`
//! - Windows:  `%APPDATA%\Keyswap\config.toml`
//!
//! Only macOS can actually remap keys; the other locations exist so the rule
//! editing commands work anywhere.
//!
//! # File layout
//!
//! Three sections, all optional.  A user who only wants more logging and a
//! snappier permission check writes:
//!
//! ```toml
//! [agent]
//! log_level = "debug"
//!
//! [permission]
//! fast_poll_ms = 500
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, and every section
//! `#[serde(default)]`, so a partial file (or no file at all) still yields a
//! complete configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::permission_watch::PollIntervals;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level agent configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// General agent behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Show the system Accessibility prompt once at startup when untrusted.
    #[serde(default = "default_true")]
    pub prompt_for_permission: bool,
}

/// Accessibility polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionConfig {
    /// Poll interval while untrusted or while the tap is down.
    #[serde(default = "default_fast_poll_ms")]
    pub fast_poll_ms: u64,
    /// Poll interval once trusted and running.
    #[serde(default = "default_slow_poll_ms")]
    pub slow_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Rules file; relative paths are resolved against the config directory.
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_fast_poll_ms() -> u64 {
    1_000
}
fn default_slow_poll_ms() -> u64 {
    10_000
}
fn default_rules_file() -> PathBuf {
    PathBuf::from("rules.json")
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prompt_for_permission: default_true(),
        }
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            fast_poll_ms: default_fast_poll_ms(),
            slow_poll_ms: default_slow_poll_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rules_file: default_rules_file(),
        }
    }
}

impl PermissionConfig {
    /// Converts to monitor intervals.  Zero values are raised to 1 ms so the
    /// monitor never spins.
    pub fn intervals(&self) -> PollIntervals {
        PollIntervals {
            fast: Duration::from_millis(self.fast_poll_ms.max(1)),
            slow: Duration::from_millis(self.slow_poll_ms.max(1)),
        }
    }
}

impl StorageConfig {
    /// Resolves `rules_file` against `base_dir` unless it is absolute.
    pub fn rules_path(&self, base_dir: &Path) -> PathBuf {
        if self.rules_file.is_absolute() {
            self.rules_file.clone()
        } else {
            base_dir.join(&self.rules_file)
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory including the `Keyswap` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Keyswap")
        })
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyswap"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Keyswap"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
