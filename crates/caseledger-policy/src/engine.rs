//! TOML-driven recording-mode policy.
//!
//! `TomlModePolicy` holds the `[[rules]]` of a `LedgerConfig` and implements
//! the `ModePolicy` trait from caseledger-core.
//!
//! Evaluation:
//!
//! 1. Iterate rules in declaration order.
//! 2. The first rule whose `table` and `operation` patterns match the call
//!    site decides its mode.
//! 3. If no rule matched, the call site is strict.

use std::path::Path;

use tracing::debug;

use caseledger_contracts::{
    error::LedgerResult,
    mode::{AuditMode, CallSite},
};
use caseledger_core::traits::ModePolicy;

use crate::{rule::ModeRule, settings::LedgerConfig};

/// A `ModePolicy` backed by TOML rules.
///
/// ```rust,ignore
/// use caseledger_policy::TomlModePolicy;
///
/// let policy = TomlModePolicy::from_file(Path::new("caseledger.toml"))?;
/// let recorder = AuditRecorder::new(store, Box::new(policy), settings);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlModePolicy {
    rules: Vec<ModeRule>,
}

impl TomlModePolicy {
    /// Take the rules of an already validated configuration.
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self { rules: config.rules.clone() }
    }

    /// Parse `s` as a caseledger TOML document and keep its rules.
    ///
    /// Returns `LedgerError::ConfigError` under the same conditions as
    /// `LedgerConfig::from_toml_str`.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        LedgerConfig::from_toml_str(s).map(|config| Self::from_config(&config))
    }

    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        LedgerConfig::from_file(path).map(|config| Self::from_config(&config))
    }

    pub fn rules(&self) -> &[ModeRule] {
        &self.rules
    }
}

impl ModePolicy for TomlModePolicy {
    fn mode_for(&self, site: &CallSite) -> LedgerResult<AuditMode> {
        match self.rules.iter().find(|rule| rule.matches(site)) {
            Some(rule) => {
                debug!(
                    rule_id = %rule.id,
                    table_name = %site.table_name,
                    operation = %site.operation,
                    mode = ?rule.mode,
                    "recording-mode rule matched"
                );
                Ok(rule.audit_mode())
            }
            None => {
                debug!(
                    table_name = %site.table_name,
                    operation = %site.operation,
                    "no recording-mode rule matched; recording strictly"
                );
                Ok(AuditMode::Strict)
            }
        }
    }
}
