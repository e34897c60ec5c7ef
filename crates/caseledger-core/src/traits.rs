//! Core trait definitions for the caseledger audit chain.
//!
//! - `AuditStore` — trusted sink; the single serialization point of the chain
//! - `Clock`      — the store's time source (never the client's)
//! - `ModePolicy` — decides strict vs. lenient handling per call site
//! - `Verifier`   — read-only integrity check over a store
//!
//! The recorder composes a store and a mode policy.  Verification is wired
//! separately by the reporting layer.

use chrono::{DateTime, Utc};

use caseledger_contracts::{
    error::LedgerResult,
    mode::{AuditMode, CallSite},
    record::{AuditRecord, Checkpoint, NewAuditRecord},
    verify::VerificationReport,
};

/// An append-only, hash-chained record store.
///
/// There is deliberately no update or delete method.  Implementations must
/// also refuse mutation at their storage layer so a privileged direct path
/// cannot rewrite history without breaking the chain.
pub trait AuditStore: Send + Sync {
    /// Append one record as the new tip.
    ///
    /// Reads the current tip, assigns `sequence` and `occurred_at`, computes
    /// `content_hash` and `chain_hash`, persists the record and advances the
    /// tip, all in one atomic unit.  A candidate whose idempotency key is
    /// already stored returns the stored record and appends nothing.
    fn append(&self, candidate: NewAuditRecord) -> LedgerResult<AuditRecord>;

    /// Append only if the tip is still `expected_tip` (`None` = empty store).
    ///
    /// Returns `LedgerError::ConcurrentAppendConflict` when another writer
    /// advanced the tip first.
    fn append_after(
        &self,
        expected_tip: Option<&Checkpoint>,
        candidate: NewAuditRecord,
    ) -> LedgerResult<AuditRecord>;

    /// Records with `from <= sequence <= to`, ascending, from one snapshot.
    fn read_range(&self, from: u64, to: u64) -> LedgerResult<Vec<AuditRecord>>;

    /// The most recently appended record's position, or `None` when empty.
    fn tip(&self) -> LedgerResult<Option<Checkpoint>>;

    /// Number of stored records.
    fn len(&self) -> LedgerResult<u64>;

    fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    fn find_by_idempotency_key(&self, key: &str) -> LedgerResult<Option<AuditRecord>>;
}

/// The store's clock.  Client-supplied timestamps are never trusted.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Maps a recording call site to its failure-handling mode.
pub trait ModePolicy: Send + Sync {
    fn mode_for(&self, site: &CallSite) -> LedgerResult<AuditMode>;
}

/// Every call site is strict.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictEverywhere;

impl ModePolicy for StrictEverywhere {
    fn mode_for(&self, _site: &CallSite) -> LedgerResult<AuditMode> {
        Ok(AuditMode::Strict)
    }
}

/// Read-only integrity check over an `AuditStore`.
///
/// A broken chain is reported in the returned `VerificationReport`; `Err`
/// is reserved for failures to read the store at all.
pub trait Verifier: Send + Sync {
    /// Verify the whole chain from genesis.
    fn verify(&self, store: &dyn AuditStore) -> LedgerResult<VerificationReport>;

    /// Verify only the suffix after a previously verified `checkpoint`.
    fn verify_from(
        &self,
        store: &dyn AuditStore,
        checkpoint: &Checkpoint,
    ) -> LedgerResult<VerificationReport>;
}
