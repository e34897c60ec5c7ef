//! Strict vs. lenient audit handling.
//!
//! Every call site that records an action is identified by its
//! `(table_name, operation)` pair.  A `ModePolicy` maps call sites to an
//! `AuditMode`.  Strict is the default; lenient is an explicit opt-out that
//! must carry a reason.

use serde::{Deserialize, Serialize};

use crate::record::Operation;

/// How the recorder treats a failed append at one call site.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum AuditMode {
    /// The failure propagates; the business action must not commit.
    #[default]
    Strict,

    /// The failure is logged out-of-band and the business action proceeds.
    Lenient {
        /// Why this call site may proceed unaudited.
        reason: String,
    },
}

impl AuditMode {
    pub fn is_strict(&self) -> bool {
        matches!(self, AuditMode::Strict)
    }
}

/// The call site a mode decision is made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub table_name: String,
    pub operation: Operation,
}

impl CallSite {
    pub fn new(table_name: impl Into<String>, operation: Operation) -> Self {
        Self { table_name: table_name.into(), operation }
    }
}
