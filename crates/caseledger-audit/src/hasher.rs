//! Record hasher: the deterministic content digest of one audit record.
//!
//! The digest covers every record field except the two hashes.  Fields are
//! fed into SHA-256 in a fixed, versioned order, each as a one-byte type tag
//! followed by its payload:
//!
//!   `0x00`  absent (no payload)
//!   `0x01`  string: u64 big-endian byte length, then UTF-8 bytes
//!   `0x02`  u64: 8 bytes big-endian
//!
//! Field order after the version tag:
//!   sequence, id, actor_id, table_name, record_id, operation,
//!   changed_fields, occurred_at, idempotency_key
//!
//! `changed_fields` is a u64 count, then per key (ascending): the key, the
//! old value and the new value, each value as absent or as its compact JSON.
//! `occurred_at` is RFC 3339 UTC with exactly six fractional digits.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{AuditRecord, ChangedFields, NewAuditRecord, Operation, RecordId},
};

/// Version tag mixed into every content hash.
pub const RECORD_HASH_VERSION: &str = "caseledger.record.v1";

const TAG_ABSENT: u8 = 0x00;
const TAG_STRING: u8 = 0x01;
const TAG_U64: u8 = 0x02;

/// Borrowed view of every hashed field of one record.
#[derive(Debug, Clone, Copy)]
pub struct HashInput<'a> {
    pub sequence: u64,
    pub id: &'a RecordId,
    pub actor_id: Option<&'a str>,
    pub table_name: &'a str,
    pub record_id: &'a str,
    pub operation: &'a Operation,
    pub changed_fields: &'a ChangedFields,
    pub occurred_at: &'a DateTime<Utc>,
    pub idempotency_key: Option<&'a str>,
}

impl<'a> HashInput<'a> {
    /// The hashed fields of a stored record.
    pub fn from_record(record: &'a AuditRecord) -> Self {
        Self {
            sequence: record.sequence,
            id: &record.id,
            actor_id: record.actor_id.as_deref(),
            table_name: &record.table_name,
            record_id: &record.record_id,
            operation: &record.operation,
            changed_fields: &record.changed_fields,
            occurred_at: &record.occurred_at,
            idempotency_key: record.idempotency_key.as_deref(),
        }
    }

    /// The hashed fields of a candidate once the store has placed it.
    pub fn from_candidate(
        candidate: &'a NewAuditRecord,
        sequence: u64,
        id: &'a RecordId,
        occurred_at: &'a DateTime<Utc>,
    ) -> Self {
        Self {
            sequence,
            id,
            actor_id: candidate.actor_id.as_deref(),
            table_name: &candidate.table_name,
            record_id: &candidate.record_id,
            operation: &candidate.operation,
            changed_fields: &candidate.changed_fields,
            occurred_at,
            idempotency_key: candidate.idempotency_key.as_deref(),
        }
    }
}

/// Compute the lowercase hex SHA-256 content hash of `input`.
///
/// # Errors
///
/// `LedgerError::HashComputation` when `table_name`, `record_id`, a changed
/// field name or an `Operation::Other` label is empty, or a value cannot be
/// rendered as JSON.
pub fn content_hash(input: &HashInput<'_>) -> LedgerResult<String> {
    validate(input)?;

    let mut enc = CanonicalEncoder::new();
    enc.string(RECORD_HASH_VERSION);
    enc.u64(input.sequence);
    enc.string(&input.id.to_string());
    enc.opt_string(input.actor_id);
    enc.string(input.table_name);
    enc.string(input.record_id);
    enc.string(input.operation.as_str());

    enc.u64(input.changed_fields.len() as u64);
    for (field, change) in input.changed_fields {
        enc.string(field);
        enc.opt_json(field, change.old_value.as_ref())?;
        enc.opt_json(field, change.new_value.as_ref())?;
    }

    enc.string(&canonical_timestamp(input.occurred_at));
    enc.opt_string(input.idempotency_key);

    Ok(enc.finish())
}

/// Recompute the content hash of a stored record from its fields.
pub fn record_content_hash(record: &AuditRecord) -> LedgerResult<String> {
    content_hash(&HashInput::from_record(record))
}

/// The timestamp text that enters the hash: UTC, microseconds, `Z` suffix.
pub fn canonical_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Truncate a clock reading to the precision the hash commits to.
pub fn store_timestamp(t: DateTime<Utc>) -> DateTime<Utc> {
    let micros_as_nanos = (t.nanosecond() / 1_000) * 1_000;
    t.with_nanosecond(micros_as_nanos).unwrap_or(t)
}

fn validate(input: &HashInput<'_>) -> LedgerResult<()> {
    if input.table_name.is_empty() {
        return Err(LedgerError::HashComputation { reason: "table_name is empty".to_string() });
    }
    if input.record_id.is_empty() {
        return Err(LedgerError::HashComputation { reason: "record_id is empty".to_string() });
    }
    if input.operation.as_str().is_empty() {
        return Err(LedgerError::HashComputation { reason: "operation label is empty".to_string() });
    }
    if input.changed_fields.keys().any(String::is_empty) {
        return Err(LedgerError::HashComputation {
            reason: "changed_fields contains an empty field name".to_string(),
        });
    }
    Ok(())
}

/// Streams tagged fields straight into a SHA-256 state.
struct CanonicalEncoder {
    hasher: Sha256,
}

impl CanonicalEncoder {
    fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    fn absent(&mut self) {
        self.hasher.update([TAG_ABSENT]);
    }

    fn string(&mut self, s: &str) {
        self.hasher.update([TAG_STRING]);
        self.hasher.update((s.len() as u64).to_be_bytes());
        self.hasher.update(s.as_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.hasher.update([TAG_U64]);
        self.hasher.update(v.to_be_bytes());
    }

    fn opt_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.string(s),
            None => self.absent(),
        }
    }

    fn opt_json(&mut self, field: &str, value: Option<&Value>) -> LedgerResult<()> {
        match value {
            Some(v) => {
                let json = serde_json::to_string(v).map_err(|e| LedgerError::HashComputation {
                    reason: format!("field '{field}' is not serializable: {e}"),
                })?;
                self.string(&json);
            }
            None => self.absent(),
        }
        Ok(())
    }

    fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use caseledger_contracts::record::FieldChange;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn candidate() -> NewAuditRecord {
        NewAuditRecord::new("cases", "case-42", Operation::Update)
            .by("user-7")
            .change("status", FieldChange::changed(json!("open"), json!("closed")))
    }

    fn hash_of(candidate: &NewAuditRecord, sequence: u64, id: &RecordId) -> String {
        let at = fixed_time();
        content_hash(&HashInput::from_candidate(candidate, sequence, id, &at)).unwrap()
    }

    #[test]
    fn hash_is_deterministic() {
        let id = RecordId::new();
        let c = candidate();
        assert_eq!(hash_of(&c, 1, &id), hash_of(&c, 1, &id));
        assert_eq!(hash_of(&c, 1, &id).len(), 64);
    }

    #[test]
    fn every_field_contributes() {
        let id = RecordId::new();
        let base = hash_of(&candidate(), 1, &id);

        assert_ne!(base, hash_of(&candidate(), 2, &id), "sequence");
        assert_ne!(base, hash_of(&candidate(), 1, &RecordId::new()), "id");

        let mut c = candidate();
        c.actor_id = None;
        assert_ne!(base, hash_of(&c, 1, &id), "actor_id");

        let mut c = candidate();
        c.operation = Operation::Delete;
        assert_ne!(base, hash_of(&c, 1, &id), "operation");

        let c = candidate().idempotency_key("k-1");
        assert_ne!(base, hash_of(&c, 1, &id), "idempotency_key");

        let c = candidate().change("status", FieldChange::changed(json!("open"), json!("archived")));
        assert_ne!(base, hash_of(&c, 1, &id), "changed_fields");
    }

    #[test]
    fn absent_and_null_values_do_not_collide() {
        let id = RecordId::new();
        let absent = NewAuditRecord::new("tasks", "t-1", Operation::Create)
            .change("due", FieldChange { old_value: None, new_value: None });
        let null = NewAuditRecord::new("tasks", "t-1", Operation::Create)
            .change("due", FieldChange { old_value: Some(Value::Null), new_value: None });
        assert_ne!(hash_of(&absent, 1, &id), hash_of(&null, 1, &id));
    }

    #[test]
    fn shifted_field_boundaries_do_not_collide() {
        let id = RecordId::new();
        let a = NewAuditRecord::new("ab", "c", Operation::Create);
        let b = NewAuditRecord::new("a", "bc", Operation::Create);
        assert_ne!(hash_of(&a, 1, &id), hash_of(&b, 1, &id));
    }

    #[test]
    fn sub_microsecond_noise_is_not_hashed() {
        let id = RecordId::new();
        let c = candidate();
        let exact = fixed_time();
        let noisy = exact.with_nanosecond(999).unwrap();

        let a = content_hash(&HashInput::from_candidate(&c, 1, &id, &exact)).unwrap();
        let b = content_hash(&HashInput::from_candidate(&c, 1, &id, &noisy)).unwrap();
        assert_eq!(a, b);
        assert_eq!(store_timestamp(noisy), exact);
    }

    #[test]
    fn canonical_timestamp_is_utc_micros() {
        let t = fixed_time().with_nanosecond(123_456_789).unwrap();
        assert_eq!(canonical_timestamp(&t), "2026-03-14T09:26:53.123456Z");
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        let id = RecordId::new();
        let at = fixed_time();

        let c = NewAuditRecord::new("", "r", Operation::Create);
        let err = content_hash(&HashInput::from_candidate(&c, 1, &id, &at)).unwrap_err();
        assert!(matches!(err, LedgerError::HashComputation { .. }));

        let c = NewAuditRecord::new("cases", "r", Operation::Other(String::new()));
        assert!(content_hash(&HashInput::from_candidate(&c, 1, &id, &at)).is_err());

        let c = NewAuditRecord::new("cases", "r", Operation::Update)
            .change("", FieldChange::set(json!(1)));
        assert!(content_hash(&HashInput::from_candidate(&c, 1, &id, &at)).is_err());
    }
}
