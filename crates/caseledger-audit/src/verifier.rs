//! Chain verifier: finds the earliest point of tampering in a stored chain.
//!
//! Records are walked in ascending sequence order.  For each record, in
//! this order:
//!
//! 1. **Continuity**: its sequence is exactly the expected next sequence.
//! 2. **Content**: its fields still hash to its stored `content_hash`.
//! 3. **Link**: `link(content_hash, expected_prev)` equals its stored
//!    `chain_hash`.
//!
//! The walk stops at the first failure.  Once every record up to the store's
//! tip pointer has passed, no record may sit past the tip pointer and the
//! tip pointer itself must name the last record's chain hash.  Verification
//! never writes to the store.

use tracing::{debug, info, warn};

use caseledger_contracts::{
    error::LedgerResult,
    record::{AuditRecord, Checkpoint},
    verify::{ChainFault, VerificationReport},
};
use caseledger_core::traits::{AuditStore, Verifier};

use crate::{chain::link, hasher::record_content_hash};

/// Records read from the store per page.
pub const DEFAULT_BATCH_SIZE: u64 = 500;

/// Read-only chain verifier with bounded memory use.
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    batch_size: u64,
}

impl ChainVerifier {
    pub fn new() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Read at most `batch_size` records per page (minimum 1).
    pub fn with_batch_size(batch_size: u64) -> Self {
        Self { batch_size: batch_size.max(1) }
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    fn run(
        &self,
        store: &dyn AuditStore,
        mut walk: ChainWalk,
    ) -> LedgerResult<VerificationReport> {
        let Some(head) = store.tip()? else {
            if records_past_tip(store)? {
                return Ok(walk.broken(1, ChainFault::TipMismatch));
            }
            return Ok(walk.finish(None));
        };

        let mut from = walk.expected_sequence;
        while from <= head.sequence {
            let to = from.saturating_add(self.batch_size - 1).min(head.sequence);
            let page = store.read_range(from, to)?;
            debug!(from, to, records = page.len(), "verifying page");

            for record in &page {
                if let Err(report) = walk.step(record) {
                    return Ok(report);
                }
            }
            from = to + 1;
        }

        if records_past_tip(store)? {
            return Ok(walk.broken(head.sequence + 1, ChainFault::TipMismatch));
        }

        Ok(walk.finish(Some(&head)))
    }

    /// Check that `checkpoint` still names a stored record with that hash.
    fn check_checkpoint(
        store: &dyn AuditStore,
        checkpoint: &Checkpoint,
    ) -> LedgerResult<Option<VerificationReport>> {
        if checkpoint.sequence == 0 {
            return Ok(None);
        }

        let head = store.tip()?;
        let head_sequence = head.as_ref().map_or(0, |h| h.sequence);
        if checkpoint.sequence > head_sequence {
            return Ok(Some(VerificationReport::broken(
                checkpoint.sequence,
                ChainFault::TipMismatch,
                0,
                None,
            )));
        }

        let stored = store.read_range(checkpoint.sequence, checkpoint.sequence)?;
        let report = match stored.first() {
            None => Some(VerificationReport::broken(
                checkpoint.sequence,
                ChainFault::SequenceGap {
                    expected: checkpoint.sequence,
                    found: head_sequence,
                },
                0,
                None,
            )),
            Some(record) if record.chain_hash != checkpoint.chain_hash => {
                Some(VerificationReport::broken(
                    checkpoint.sequence,
                    ChainFault::ChainLinkMismatch,
                    0,
                    None,
                ))
            }
            Some(_) => None,
        };
        Ok(report)
    }
}

impl Default for ChainVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier for ChainVerifier {
    fn verify(&self, store: &dyn AuditStore) -> LedgerResult<VerificationReport> {
        let report = self.run(store, ChainWalk::from_genesis())?;
        log_report(&report, None);
        Ok(report)
    }

    fn verify_from(
        &self,
        store: &dyn AuditStore,
        checkpoint: &Checkpoint,
    ) -> LedgerResult<VerificationReport> {
        let report = match Self::check_checkpoint(store, checkpoint)? {
            Some(report) => report,
            None => self.run(store, ChainWalk::after(checkpoint))?,
        };
        log_report(&report, Some(checkpoint));
        Ok(report)
    }
}

/// Verify an ordered slice of records, e.g. an exported snapshot.
///
/// `start` is the checkpoint the slice continues from (`None` = genesis).
/// `head`, when given, is the tip the slice claims to end at.
pub fn verify_records(
    records: &[AuditRecord],
    start: Option<&Checkpoint>,
    head: Option<&Checkpoint>,
) -> VerificationReport {
    let mut walk = match start {
        Some(checkpoint) => ChainWalk::after(checkpoint),
        None => ChainWalk::from_genesis(),
    };
    for record in records {
        if let Err(report) = walk.step(record) {
            return report;
        }
    }
    match head {
        Some(head) => walk.finish(Some(head)),
        None => walk.finish_open(),
    }
}

/// True when the store holds more records than its tip pointer accounts for.
///
/// Sequences are unique, so a count above the tip's sequence means some
/// record sits past the tip.  The count is read before the tip: an append
/// advances both together, so a concurrent append can only make the tip
/// look further ahead, never the count.
fn records_past_tip(store: &dyn AuditStore) -> LedgerResult<bool> {
    let count = store.len()?;
    let tip = store.tip()?.map_or(0, |tip| tip.sequence);
    Ok(count > tip)
}

fn log_report(report: &VerificationReport, start: Option<&Checkpoint>) {
    let from_sequence = start.map_or(0, |c| c.sequence);
    if report.is_valid {
        info!(
            from_sequence,
            records_checked = report.records_checked,
            "audit chain verified"
        );
    } else {
        warn!(
            from_sequence,
            broken_at = report.broken_at.unwrap_or_default(),
            error = report.error_message.as_deref().unwrap_or_default(),
            "audit chain integrity broken"
        );
    }
}

// ── Walk state ────────────────────────────────────────────────────────────────

/// Running state of one verification pass.
struct ChainWalk {
    expected_sequence: u64,
    expected_prev: String,
    checked: u64,
    verified_tip: Option<Checkpoint>,
}

impl ChainWalk {
    fn from_genesis() -> Self {
        Self {
            expected_sequence: 1,
            expected_prev: AuditRecord::GENESIS_HASH.to_string(),
            checked: 0,
            verified_tip: None,
        }
    }

    fn after(checkpoint: &Checkpoint) -> Self {
        if checkpoint.sequence == 0 {
            return Self::from_genesis();
        }
        Self {
            expected_sequence: checkpoint.sequence + 1,
            expected_prev: checkpoint.chain_hash.clone(),
            checked: 0,
            verified_tip: Some(checkpoint.clone()),
        }
    }

    fn broken(&self, sequence: u64, fault: ChainFault) -> VerificationReport {
        VerificationReport::broken(sequence, fault, self.checked, self.verified_tip.clone())
    }

    fn step(&mut self, record: &AuditRecord) -> Result<(), VerificationReport> {
        if record.sequence != self.expected_sequence {
            return Err(self.broken(
                self.expected_sequence,
                ChainFault::SequenceGap {
                    expected: self.expected_sequence,
                    found: record.sequence,
                },
            ));
        }

        // A record that cannot even be re-hashed has been altered into an
        // invalid shape; that is a content finding, not a read failure.
        match record_content_hash(record) {
            Ok(recomputed) if recomputed == record.content_hash => {}
            _ => return Err(self.broken(record.sequence, ChainFault::ContentHashMismatch)),
        }

        match link(&record.content_hash, &self.expected_prev) {
            Ok(expected) if expected == record.chain_hash => {}
            _ => return Err(self.broken(record.sequence, ChainFault::ChainLinkMismatch)),
        }

        self.checked += 1;
        self.expected_sequence = record.sequence + 1;
        self.expected_prev = record.chain_hash.clone();
        self.verified_tip = Some(record.checkpoint());
        Ok(())
    }

    /// Close the walk against the store's tip pointer.
    fn finish(self, head: Option<&Checkpoint>) -> VerificationReport {
        let head_sequence = head.map_or(0, |h| h.sequence);
        let walked_to = self.expected_sequence - 1;

        if walked_to < head_sequence {
            return self.broken(
                self.expected_sequence,
                ChainFault::SequenceGap { expected: self.expected_sequence, found: head_sequence },
            );
        }
        if walked_to > head_sequence {
            return self.broken(walked_to, ChainFault::TipMismatch);
        }
        if let Some(head) = head {
            if head.chain_hash != self.expected_prev {
                return self.broken(head.sequence, ChainFault::TipMismatch);
            }
        }
        self.finish_open()
    }

    fn finish_open(self) -> VerificationReport {
        VerificationReport::valid(self.checked, self.verified_tip)
    }
}
