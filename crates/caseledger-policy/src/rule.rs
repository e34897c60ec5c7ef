//! Recording-mode rule types.
//!
//! A rule names a call site pattern (`table`, `operation`) and the mode that
//! call site records in.  Rules are evaluated in declaration order; the first
//! matching rule wins.  A call site no rule matches records strictly.

use serde::{Deserialize, Serialize};

use caseledger_contracts::mode::{AuditMode, CallSite};

/// The mode a rule assigns, as written in TOML.
///
/// ```toml
/// mode = "strict"
/// mode = "lenient"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleMode {
    Strict,
    Lenient,
}

/// A single recording-mode rule loaded from TOML.
///
/// Both `table` and `operation` accept the wildcard `"*"`.  `operation` is
/// compared against the operation label (`"CREATE"`, `"UPDATE"`, `"DELETE"`
/// or a custom label), case-sensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRule {
    /// Stable identifier used in log lines and error messages.
    pub id: String,

    /// Human-readable explanation of why this call site records the way it does.
    #[serde(default)]
    pub description: String,

    pub table: String,

    pub operation: String,

    pub mode: RuleMode,

    /// Required for `mode = "lenient"`: the documented reason the business
    /// action may proceed without an audit record.
    pub reason: Option<String>,
}

impl ModeRule {
    /// Return true if this rule applies to `site`.
    pub fn matches(&self, site: &CallSite) -> bool {
        let table_matches = self.table == "*" || self.table == site.table_name;
        let operation_matches = self.operation == "*" || self.operation == site.operation.as_str();
        table_matches && operation_matches
    }

    /// The `AuditMode` this rule assigns.
    ///
    /// A lenient rule is only constructed by the engine after its reason has
    /// been validated, so the fallback text here is never surfaced in
    /// practice.
    pub fn audit_mode(&self) -> AuditMode {
        match self.mode {
            RuleMode::Strict => AuditMode::Strict,
            RuleMode::Lenient => AuditMode::Lenient {
                reason: self
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("lenient by rule '{}'", self.id)),
            },
        }
    }

    /// A lenient rule must say why.
    pub(crate) fn has_documented_reason(&self) -> bool {
        match self.mode {
            RuleMode::Strict => true,
            RuleMode::Lenient => self.reason.as_deref().is_some_and(|r| !r.trim().is_empty()),
        }
    }
}
