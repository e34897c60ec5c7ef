//! Chain verification report types.
//!
//! A broken chain is an expected, actionable outcome, so the verifier
//! returns it as data.  `ChainFault` keeps the three failure classes apart:
//! an edited record, a re-linked record, and a removed record, plus a tip
//! pointer that no longer matches the chain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::Checkpoint;

/// What exactly failed at `VerificationReport::broken_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainFault {
    /// The record's stored fields no longer hash to its stored `content_hash`.
    ContentHashMismatch,

    /// The stored `chain_hash` does not link the record to its predecessor.
    ChainLinkMismatch,

    /// A sequence number is missing.  `found` is the next sequence actually
    /// present, or the tip's sequence when the hole runs up to the tip.
    SequenceGap { expected: u64, found: u64 },

    /// The store's tip pointer disagrees with the last record's chain hash.
    TipMismatch,
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFault::ContentHashMismatch => f.write_str("content hash mismatch"),
            ChainFault::ChainLinkMismatch => f.write_str("chain link mismatch"),
            ChainFault::SequenceGap { .. } => f.write_str("sequence gap detected"),
            ChainFault::TipMismatch => f.write_str("chain tip mismatch"),
        }
    }
}

/// Outcome of one verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub is_valid: bool,
    /// Sequence of the first bad record; `None` when valid.
    pub broken_at: Option<u64>,
    /// Operator-facing description of the fault; `None` when valid.
    pub error_message: Option<String>,
    pub fault: Option<ChainFault>,
    /// How many records were fully checked and found valid.
    pub records_checked: u64,
    /// The last position confirmed valid, if any.
    ///
    /// Feed it back into an incremental run to skip the verified prefix.
    pub verified_tip: Option<Checkpoint>,
}

impl VerificationReport {
    /// A passing report.
    pub fn valid(records_checked: u64, verified_tip: Option<Checkpoint>) -> Self {
        Self {
            is_valid: true,
            broken_at: None,
            error_message: None,
            fault: None,
            records_checked,
            verified_tip,
        }
    }

    /// A failing report for `fault` at `sequence`.
    pub fn broken(
        sequence: u64,
        fault: ChainFault,
        records_checked: u64,
        verified_tip: Option<Checkpoint>,
    ) -> Self {
        let error_message = format!("{fault} at sequence {sequence}");
        Self {
            is_valid: false,
            broken_at: Some(sequence),
            error_message: Some(error_message),
            fault: Some(fault),
            records_checked,
            verified_tip,
        }
    }
}
