//! The audit recorder: the one call business actions make to record what
//! they did.
//!
//! The recorder enforces the append path:
//!
//!   CallSite → ModePolicy → AuditStore::append (retry on conflict) → outcome
//!
//! Hashing and linking happen inside the store's atomic append, so the
//! recorder never sees or caches the chain tip.  A failed append either
//! fails the caller (strict, the default) or is logged out-of-band and
//! reported as `RecordOutcome::Unrecorded` (lenient, opted into per call
//! site by the mode policy).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    mode::{AuditMode, CallSite},
    record::{AuditRecord, ChangedFields, NewAuditRecord, Operation},
};

use crate::traits::{AuditStore, ModePolicy};

/// Tunables for the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderSettings {
    /// Total append attempts per record when the store reports a conflict.
    #[serde(default = "RecorderSettings::default_max_append_attempts")]
    pub max_append_attempts: u32,
}

impl RecorderSettings {
    fn default_max_append_attempts() -> u32 {
        3
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self { max_append_attempts: Self::default_max_append_attempts() }
    }
}

/// What happened to one `record` call.
#[derive(Debug)]
pub enum RecordOutcome {
    /// The record is durably appended.
    Recorded(AuditRecord),

    /// Lenient call site only: the append failed and the failure was logged.
    /// The caller may proceed, but the action is NOT on the chain.
    Unrecorded {
        /// The documented reason this call site is lenient.
        reason: String,
        /// The append failure.
        error: LedgerError,
    },
}

impl RecordOutcome {
    pub fn record(&self) -> Option<&AuditRecord> {
        match self {
            RecordOutcome::Recorded(record) => Some(record),
            RecordOutcome::Unrecorded { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<AuditRecord> {
        match self {
            RecordOutcome::Recorded(record) => Some(record),
            RecordOutcome::Unrecorded { .. } => None,
        }
    }
}

/// The facade external business logic records actions through.
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    policy: Box<dyn ModePolicy>,
    settings: RecorderSettings,
}

impl AuditRecorder {
    pub fn new(
        store: Arc<dyn AuditStore>,
        policy: Box<dyn ModePolicy>,
        settings: RecorderSettings,
    ) -> Self {
        Self { store, policy, settings }
    }

    /// The store this recorder appends to, for reporting collaborators.
    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Record one action.
    ///
    /// # Errors
    ///
    /// In strict mode every append failure is returned.  In lenient mode
    /// only a failing mode policy is an error; append failures come back as
    /// `RecordOutcome::Unrecorded`.
    pub fn record(
        &self,
        actor_id: Option<&str>,
        table_name: &str,
        record_id: &str,
        operation: Operation,
        changed_fields: ChangedFields,
    ) -> LedgerResult<RecordOutcome> {
        let mut candidate =
            NewAuditRecord::new(table_name, record_id, operation).with_changes(changed_fields);
        candidate.actor_id = actor_id.map(str::to_string);
        self.record_request(candidate)
    }

    /// Record a fully built candidate (e.g. one carrying an idempotency key).
    pub fn record_request(&self, candidate: NewAuditRecord) -> LedgerResult<RecordOutcome> {
        let site = CallSite::new(candidate.table_name.clone(), candidate.operation.clone());
        let mode = self.policy.mode_for(&site)?;

        match self.append_with_retry(candidate) {
            Ok(record) => Ok(RecordOutcome::Recorded(record)),
            Err(e) => match mode {
                AuditMode::Strict => Err(e),
                AuditMode::Lenient { reason } => {
                    error!(
                        table_name = %site.table_name,
                        operation = %site.operation,
                        lenient_reason = %reason,
                        error = %e,
                        "audit append failed; lenient call site proceeds unaudited"
                    );
                    Ok(RecordOutcome::Unrecorded { reason, error: e })
                }
            },
        }
    }

    fn append_with_retry(&self, candidate: NewAuditRecord) -> LedgerResult<AuditRecord> {
        let max_attempts = self.settings.max_append_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.store.append(candidate.clone()) {
                Ok(record) => {
                    debug!(
                        sequence = record.sequence,
                        table_name = %record.table_name,
                        record_id = %record.record_id,
                        operation = %record.operation,
                        chain_hash = %record.chain_hash,
                        "audit record appended"
                    );
                    return Ok(record);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        table_name = %candidate.table_name,
                        error = %e,
                        "audit append conflicted; retrying against refreshed tip"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use serde_json::json;

    use caseledger_contracts::record::{Checkpoint, FieldChange, RecordId};

    use super::*;
    use crate::traits::StrictEverywhere;

    // ── Mock implementations ──────────────────────────────────────────────────

    /// A store that fails the first `failures` appends with a clone of
    /// `failure`, then appends with placeholder hashes.
    struct MockStore {
        records: Mutex<Vec<AuditRecord>>,
        failures: Mutex<u32>,
        failure: fn() -> LedgerError,
        append_calls: Mutex<u32>,
    }

    impl MockStore {
        fn new() -> Self {
            Self::failing(0, || LedgerError::StoreUnavailable { reason: "unused".to_string() })
        }

        fn failing(failures: u32, failure: fn() -> LedgerError) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                failures: Mutex::new(failures),
                failure,
                append_calls: Mutex::new(0),
            }
        }
    }

    impl AuditStore for MockStore {
        fn append(&self, candidate: NewAuditRecord) -> LedgerResult<AuditRecord> {
            *self.append_calls.lock().unwrap() += 1;
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err((self.failure)());
                }
            }
            let mut records = self.records.lock().unwrap();
            let record = AuditRecord {
                sequence: records.len() as u64 + 1,
                id: RecordId::new(),
                actor_id: candidate.actor_id,
                table_name: candidate.table_name,
                record_id: candidate.record_id,
                operation: candidate.operation,
                changed_fields: candidate.changed_fields,
                occurred_at: Utc::now(),
                idempotency_key: candidate.idempotency_key,
                content_hash: "c".repeat(64),
                chain_hash: "h".repeat(64),
            };
            records.push(record.clone());
            Ok(record)
        }

        fn append_after(
            &self,
            _expected_tip: Option<&Checkpoint>,
            candidate: NewAuditRecord,
        ) -> LedgerResult<AuditRecord> {
            self.append(candidate)
        }

        fn read_range(&self, from: u64, to: u64) -> LedgerResult<Vec<AuditRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|r| r.sequence >= from && r.sequence <= to)
                .cloned()
                .collect())
        }

        fn tip(&self) -> LedgerResult<Option<Checkpoint>> {
            Ok(self.records.lock().unwrap().last().map(AuditRecord::checkpoint))
        }

        fn len(&self) -> LedgerResult<u64> {
            Ok(self.records.lock().unwrap().len() as u64)
        }

        fn find_by_idempotency_key(&self, key: &str) -> LedgerResult<Option<AuditRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .find(|r| r.idempotency_key.as_deref() == Some(key))
                .cloned())
        }
    }

    /// A mode policy that returns a fixed mode and remembers every call site.
    struct MockPolicy {
        mode: AuditMode,
        seen: Arc<Mutex<Vec<CallSite>>>,
    }

    impl MockPolicy {
        fn new(mode: AuditMode) -> Self {
            Self { mode, seen: Arc::new(Mutex::new(Vec::new())) }
        }
    }

    impl ModePolicy for MockPolicy {
        fn mode_for(&self, site: &CallSite) -> LedgerResult<AuditMode> {
            self.seen.lock().unwrap().push(site.clone());
            Ok(self.mode.clone())
        }
    }

    fn conflict() -> LedgerError {
        LedgerError::ConcurrentAppendConflict { reason: "tip moved".to_string() }
    }

    fn unavailable() -> LedgerError {
        LedgerError::StoreUnavailable { reason: "connection refused".to_string() }
    }

    fn recorder(store: Arc<MockStore>, mode: AuditMode) -> AuditRecorder {
        AuditRecorder::new(store, Box::new(MockPolicy::new(mode)), RecorderSettings::default())
    }

    fn lenient() -> AuditMode {
        AuditMode::Lenient { reason: "chat mirror is re-derivable".to_string() }
    }

    // ── Test cases ────────────────────────────────────────────────────────────

    #[test]
    fn test_record_appends_and_returns_record() {
        let store = Arc::new(MockStore::new());
        let recorder = recorder(Arc::clone(&store), AuditMode::Strict);

        let mut changes = ChangedFields::new();
        changes.insert("title".to_string(), FieldChange::set(json!("Smith v. Jones")));

        let outcome = recorder
            .record(Some("user-1"), "cases", "case-1", Operation::Create, changes)
            .unwrap();

        let record = outcome.into_record().expect("strict success must be Recorded");
        assert_eq!(record.sequence, 1);
        assert_eq!(record.actor_id.as_deref(), Some("user-1"));
        assert_eq!(record.table_name, "cases");
        assert!(record.changed_fields.contains_key("title"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_policy_sees_call_site() {
        let store = Arc::new(MockStore::new());
        let policy = MockPolicy::new(AuditMode::Strict);
        let seen = Arc::clone(&policy.seen);
        let recorder = AuditRecorder::new(store, Box::new(policy), RecorderSettings::default());

        recorder
            .record(None, "tasks", "task-4", Operation::Delete, ChangedFields::new())
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], CallSite::new("tasks", Operation::Delete));
    }

    #[test]
    fn test_conflict_is_retried_until_success() {
        let store = Arc::new(MockStore::failing(2, conflict));
        let recorder = recorder(Arc::clone(&store), AuditMode::Strict);

        let outcome = recorder
            .record_request(NewAuditRecord::new("documents", "doc-1", Operation::Create))
            .unwrap();

        assert!(outcome.record().is_some());
        assert_eq!(*store.append_calls.lock().unwrap(), 3, "two conflicts then one success");
    }

    #[test]
    fn test_conflict_retries_are_bounded() {
        let store = Arc::new(MockStore::failing(10, conflict));
        let recorder = recorder(Arc::clone(&store), AuditMode::Strict);

        let result = recorder.record_request(NewAuditRecord::new("documents", "doc-1", Operation::Create));

        assert!(matches!(result, Err(LedgerError::ConcurrentAppendConflict { .. })));
        assert_eq!(*store.append_calls.lock().unwrap(), 3);
    }

    #[test]
    fn test_non_retryable_error_is_not_retried() {
        let store = Arc::new(MockStore::failing(1, unavailable));
        let recorder = recorder(Arc::clone(&store), AuditMode::Strict);

        let result = recorder.record_request(NewAuditRecord::new("clients", "cl-1", Operation::Update));

        assert!(matches!(result, Err(LedgerError::StoreUnavailable { .. })));
        assert_eq!(*store.append_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_strict_mode_propagates_failure() {
        let store = Arc::new(MockStore::failing(1, unavailable));
        let recorder = recorder(store, AuditMode::Strict);

        let result = recorder.record(Some("u"), "cases", "case-2", Operation::Update, ChangedFields::new());

        match result {
            Err(LedgerError::StoreUnavailable { reason }) => {
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected StoreUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_mode_reports_unrecorded() {
        let store = Arc::new(MockStore::failing(1, unavailable));
        let recorder = recorder(Arc::clone(&store), lenient());

        let outcome = recorder
            .record(Some("u"), "chat_messages", "msg-1", Operation::Create, ChangedFields::new())
            .unwrap();

        match outcome {
            RecordOutcome::Unrecorded { reason, error } => {
                assert_eq!(reason, "chat mirror is re-derivable");
                assert!(matches!(error, LedgerError::StoreUnavailable { .. }));
            }
            other => panic!("expected Unrecorded, got {:?}", other),
        }
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_lenient_mode_still_records_when_store_is_healthy() {
        let store = Arc::new(MockStore::new());
        let recorder = recorder(store, lenient());

        let outcome = recorder
            .record(None, "chat_messages", "msg-2", Operation::Create, ChangedFields::new())
            .unwrap();

        assert!(matches!(outcome, RecordOutcome::Recorded(_)));
    }

    #[test]
    fn test_zero_attempts_setting_still_tries_once() {
        let store = Arc::new(MockStore::new());
        let recorder = AuditRecorder::new(
            Arc::clone(&store) as Arc<dyn AuditStore>,
            Box::new(MockPolicy::new(AuditMode::Strict)),
            RecorderSettings { max_append_attempts: 0 },
        );

        recorder
            .record_request(NewAuditRecord::new("notes", "n-1", Operation::Create))
            .unwrap();
        assert_eq!(*store.append_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_strict_everywhere_fails_every_call_site() {
        let store = Arc::new(MockStore::failing(1, unavailable));
        let recorder = AuditRecorder::new(
            store as Arc<dyn AuditStore>,
            Box::new(StrictEverywhere),
            RecorderSettings::default(),
        );

        let result = recorder.record(None, "chat_messages", "msg-3", Operation::from("SYNC"), ChangedFields::new());
        assert!(matches!(result, Err(LedgerError::StoreUnavailable { .. })));
    }
}
