//! TOML-based per-repository configuration.
//!
//! The file lives at `.gitlite/config.toml` and is written with defaults by
//! `init`. Every field has a serde default, so a missing file or a partial
//! file both load cleanly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Log levels accepted by `core.log_level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoConfig {
    /// Repository-wide settings.
    #[serde(default)]
    pub core: CoreConfig,

    /// Merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// Repository-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    /// Name of the branch created by `init` (default `master`).
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Minimum tracing level for the command line tool: trace, debug, info,
    /// warn, error, off.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_branch() -> String {
    "master".into()
}
fn default_log_level() -> String {
    "warn".into()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// How the merge base of two commits is chosen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BaseStrategy {
    /// First commit reached breadth-first from head that is an ancestor of
    /// the other tip.
    #[default]
    FirstCommon,
    /// A common ancestor that is not itself an ancestor of any other common
    /// ancestor.
    LowestCommon,
}

/// Merge behaviour settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeConfig {
    /// Merge base selection.
    #[serde(default)]
    pub base_strategy: BaseStrategy,

    /// Reject abbreviated commit ids that match more than one commit.
    #[serde(default)]
    pub strict_prefix: bool,
}

// ---------------------------------------------------------------------------
// Loading & saving
// ---------------------------------------------------------------------------

impl RepoConfig {
    /// Load a [`RepoConfig`] from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "loading configuration");
        let contents = std::fs::read_to_string(path)?;
        let config: RepoConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Write this configuration as TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let branch = &self.core.default_branch;
        if branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "core.default_branch".into(),
                detail: "branch name must not be empty".into(),
            });
        }
        if branch.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "core.default_branch".into(),
                detail: "branch name must not contain whitespace".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.core.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "core.log_level".into(),
                detail: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}
