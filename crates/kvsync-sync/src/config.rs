use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// What the router does when a change callback fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackErrorPolicy {
    /// Return the first failure from `next`, after every callback ran.
    #[default]
    Surface,
    /// Log failures and keep going.
    Log,
}

/// Change router configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reset a field to its zero value when its stored value does not
    /// parse, instead of skipping the update.
    pub ignore_unmarshal_failure: bool,
    pub callback_errors: CallbackErrorPolicy,
    /// Route deletions of `prefix/` as deletions of `prefix`.
    pub strip_trailing_slash: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore_unmarshal_failure: true,
            callback_errors: CallbackErrorPolicy::Surface,
            strip_trailing_slash: true,
        }
    }
}

impl SyncConfig {
    /// Parses a configuration from TOML. Missing settings keep their
    /// defaults.
    pub fn from_toml_str(text: &str) -> SyncResult<Self> {
        toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))
    }
}
