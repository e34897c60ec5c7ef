//! The `caseledger.toml` configuration file.
//!
//! ```toml
//! [recorder]
//! max_append_attempts = 3
//!
//! [verifier]
//! batch_size = 500
//!
//! [store]
//! path = "caseledger.db"
//!
//! [[rules]]
//! id = "lenient-chat-sync"
//! table = "chat_messages"
//! operation = "*"
//! mode = "lenient"
//! reason = "chat mirror is re-derivable from the provider"
//! ```
//!
//! Every section is optional.  An empty file is a valid configuration: an
//! in-memory store, default tunables, and strict recording everywhere.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use caseledger_contracts::error::{LedgerError, LedgerResult};
use caseledger_core::RecorderSettings;

use crate::rule::ModeRule;

/// Tunables for chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierSettings {
    /// Records read per page while walking the chain.
    #[serde(default = "VerifierSettings::default_batch_size")]
    pub batch_size: u64,
}

impl VerifierSettings {
    fn default_batch_size() -> u64 {
        500
    }
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self { batch_size: Self::default_batch_size() }
    }
}

/// Where audit records are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite database file.  `None` keeps records in memory.
    pub path: Option<PathBuf>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub recorder: RecorderSettings,

    #[serde(default)]
    pub verifier: VerifierSettings,

    #[serde(default)]
    pub store: StoreSettings,

    /// Recording-mode rules, first match wins.
    #[serde(default)]
    pub rules: Vec<ModeRule>,
}

impl LedgerConfig {
    /// Parse `s` as TOML and validate it.
    ///
    /// Returns `LedgerError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or declares a lenient rule without a reason.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to parse caseledger TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it with `from_toml_str`.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> LedgerResult<()> {
        for rule in &self.rules {
            if !rule.has_documented_reason() {
                return Err(LedgerError::ConfigError {
                    reason: format!("lenient rule '{}' must document a non-empty reason", rule.id),
                });
            }
        }
        Ok(())
    }
}
