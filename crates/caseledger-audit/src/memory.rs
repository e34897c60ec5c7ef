//! In-memory implementation of `AuditStore`.
//!
//! `InMemoryAuditStore` is the reference implementation of the store trait.
//! It keeps every record in a `Vec` behind a `Mutex`; the mutex is the
//! chain's single serialization point, so the tip is read and advanced
//! under one lock acquisition and two appends can never link to the same
//! predecessor.  The tip pointer is kept apart from the records so that a
//! record removed behind the store's back still shows up as a gap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{AuditRecord, Checkpoint, NewAuditRecord},
};
use caseledger_core::traits::{AuditStore, Clock, SystemClock};

use crate::{chain::seal, hasher::store_timestamp};

// ── Internal mutable state ────────────────────────────────────────────────────

/// The mutable interior of an `InMemoryAuditStore`.
pub(crate) struct InMemoryState {
    /// All records, in append order.
    pub(crate) records: Vec<AuditRecord>,

    /// Idempotency key → sequence of the record that carries it.
    pub(crate) keys: HashMap<String, u64>,

    /// The tip pointer, advanced only by an append.
    pub(crate) head: Option<Checkpoint>,
}

impl InMemoryState {
    fn by_key(&self, key: &str) -> Option<&AuditRecord> {
        let sequence = *self.keys.get(key)?;
        self.range(sequence, sequence).first()
    }

    /// Records with `from <= sequence <= to`.  `records` is in ascending
    /// sequence order, so both ends are found by binary search.
    fn range(&self, from: u64, to: u64) -> &[AuditRecord] {
        let start = self.records.partition_point(|r| r.sequence < from);
        let end = self.records.partition_point(|r| r.sequence <= to);
        &self.records[start..end.max(start)]
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory, append-only audit store backed by a SHA-256 hash chain.
///
/// Clones share the same chain.
#[derive(Clone)]
pub struct InMemoryAuditStore {
    clock: Arc<dyn Clock>,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditStore {
    /// Create an empty store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let state = InMemoryState { records: Vec::new(), keys: HashMap::new(), head: None };
        Self { clock, state: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }

    /// Place, hash, link and push one record.  Caller holds the lock.
    fn append_locked(
        &self,
        state: &mut InMemoryState,
        expected_tip: Option<Option<&Checkpoint>>,
        candidate: NewAuditRecord,
    ) -> LedgerResult<AuditRecord> {
        if let Some(key) = candidate.idempotency_key.as_deref() {
            if let Some(existing) = state.by_key(key) {
                debug!(
                    idempotency_key = %key,
                    sequence = existing.sequence,
                    "idempotent append; returning stored record"
                );
                return Ok(existing.clone());
            }
        }

        let tip = state.head.clone();
        if let Some(expected) = expected_tip {
            if tip.as_ref() != expected {
                return Err(LedgerError::ConcurrentAppendConflict {
                    reason: format!(
                        "expected tip at sequence {}, found {}",
                        describe_tip(expected),
                        describe_tip(tip.as_ref())
                    ),
                });
            }
        }

        let (sequence, prev_hash) = match &tip {
            Some(tip) => (tip.sequence + 1, tip.chain_hash.as_str()),
            None => (1, AuditRecord::GENESIS_HASH),
        };

        let occurred_at = store_timestamp(self.clock.now());
        let record = seal(candidate, sequence, occurred_at, prev_hash)?;

        if let Some(key) = &record.idempotency_key {
            state.keys.insert(key.clone(), record.sequence);
        }
        state.head = Some(record.checkpoint());
        state.records.push(record.clone());

        Ok(record)
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn describe_tip(tip: Option<&Checkpoint>) -> String {
    match tip {
        Some(tip) => tip.sequence.to_string(),
        None => "genesis".to_string(),
    }
}

// ── AuditStore impl ───────────────────────────────────────────────────────────

impl AuditStore for InMemoryAuditStore {
    fn append(&self, candidate: NewAuditRecord) -> LedgerResult<AuditRecord> {
        let mut state = self.lock()?;
        self.append_locked(&mut state, None, candidate)
    }

    fn append_after(
        &self,
        expected_tip: Option<&Checkpoint>,
        candidate: NewAuditRecord,
    ) -> LedgerResult<AuditRecord> {
        let mut state = self.lock()?;
        self.append_locked(&mut state, Some(expected_tip), candidate)
    }

    fn read_range(&self, from: u64, to: u64) -> LedgerResult<Vec<AuditRecord>> {
        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }
        Ok(self.lock()?.range(from, to).to_vec())
    }

    fn tip(&self) -> LedgerResult<Option<Checkpoint>> {
        Ok(self.lock()?.head.clone())
    }

    fn len(&self) -> LedgerResult<u64> {
        Ok(self.lock()?.records.len() as u64)
    }

    fn find_by_idempotency_key(&self, key: &str) -> LedgerResult<Option<AuditRecord>> {
        Ok(self.lock()?.by_key(key).cloned())
    }
}
