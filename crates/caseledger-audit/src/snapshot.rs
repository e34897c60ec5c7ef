//! Exported chain snapshots.
//!
//! A `ChainSnapshot` is a sealed copy of a store's records as of one read,
//! together with the tip pointer observed at that moment.  It can be
//! written out as JSON and verified offline with no access to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{AuditRecord, Checkpoint},
    verify::VerificationReport,
};
use caseledger_core::traits::AuditStore;

use crate::verifier::verify_records;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Every record up to `tip`, in chain order.
    pub records: Vec<AuditRecord>,

    /// The store's tip pointer when the snapshot was taken.
    pub tip: Option<Checkpoint>,

    /// Wall-clock time (UTC) the snapshot was taken.
    pub exported_at: DateTime<Utc>,
}

impl ChainSnapshot {
    /// Copy the whole chain out of `store`.
    pub fn capture(store: &dyn AuditStore) -> LedgerResult<Self> {
        let tip = store.tip()?;
        let records = match &tip {
            Some(tip) => store.read_range(1, tip.sequence)?,
            None => Vec::new(),
        };
        Ok(Self { records, tip, exported_at: Utc::now() })
    }

    /// Verify the snapshot from genesis against its own recorded tip.
    pub fn verify(&self) -> VerificationReport {
        verify_records(&self.records, None, self.tip.as_ref())
    }

    pub fn to_json(&self) -> LedgerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("failed to serialize chain snapshot: {e}"),
        })
    }

    pub fn from_json(json: &str) -> LedgerResult<Self> {
        serde_json::from_str(json).map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("malformed chain snapshot: {e}"),
        })
    }
}
