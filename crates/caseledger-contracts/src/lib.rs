//! # caseledger-contracts
//!
//! Shared record model, error taxonomy, and report types for the caseledger
//! tamper-evident audit chain.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod mode;
pub mod record;
pub mod verify;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use error::LedgerError;
    use mode::AuditMode;
    use record::{FieldChange, NewAuditRecord, Operation, RecordId};
    use verify::{ChainFault, VerificationReport};

    // ── Operation ────────────────────────────────────────────────────────────

    #[test]
    fn operation_serializes_as_upper_case_label() {
        assert_eq!(serde_json::to_string(&Operation::Create).unwrap(), "\"CREATE\"");
        assert_eq!(serde_json::to_string(&Operation::Delete).unwrap(), "\"DELETE\"");

        let decoded: Operation = serde_json::from_str("\"UPDATE\"").unwrap();
        assert_eq!(decoded, Operation::Update);
    }

    #[test]
    fn operation_other_keeps_label_verbatim() {
        let op = Operation::from("ASSIGN");
        assert_eq!(op, Operation::Other("ASSIGN".to_string()));
        assert_eq!(op.as_str(), "ASSIGN");

        let json = serde_json::to_string(&op).unwrap();
        let decoded: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, op);

        let lower = Operation::from("assign");
        assert_eq!(lower.as_str(), "assign");
        assert_eq!(serde_json::to_string(&lower).unwrap(), "\"assign\"");
    }

    // ── NewAuditRecord builder ───────────────────────────────────────────────

    #[test]
    fn builder_collects_changes_in_key_order() {
        let candidate = NewAuditRecord::new("cases", "case-17", Operation::Update)
            .by("user-9")
            .change("status", FieldChange::changed(json!("open"), json!("closed")))
            .change("assignee", FieldChange::set(json!("user-3")))
            .idempotency_key("req-abc");

        assert_eq!(candidate.actor_id.as_deref(), Some("user-9"));
        assert_eq!(candidate.idempotency_key.as_deref(), Some("req-abc"));

        let keys: Vec<&str> = candidate.changed_fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["assignee", "status"]);
    }

    #[test]
    fn field_change_keeps_null_distinct_from_absent() {
        let change = FieldChange::cleared(json!(null));
        let encoded = serde_json::to_string(&change).unwrap();
        assert_eq!(encoded, r#"{"old_value":null}"#);

        let decoded: FieldChange = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.old_value, Some(json!(null)));
        assert_eq!(decoded.new_value, None);
    }

    #[test]
    fn record_id_new_produces_unique_values() {
        let unique: std::collections::HashSet<RecordId> = (0..100).map(|_| RecordId::new()).collect();
        assert_eq!(unique.len(), 100);
    }

    // ── AuditMode ────────────────────────────────────────────────────────────

    #[test]
    fn audit_mode_defaults_to_strict() {
        assert!(AuditMode::default().is_strict());
        assert!(!AuditMode::Lenient { reason: "x".to_string() }.is_strict());
    }

    // ── VerificationReport messages ──────────────────────────────────────────

    #[test]
    fn broken_report_messages_name_the_fault() {
        let content = VerificationReport::broken(2, ChainFault::ContentHashMismatch, 1, None);
        assert_eq!(content.error_message.as_deref(), Some("content hash mismatch at sequence 2"));
        assert_eq!(content.broken_at, Some(2));
        assert!(!content.is_valid);

        let link = VerificationReport::broken(4, ChainFault::ChainLinkMismatch, 3, None);
        assert_eq!(link.error_message.as_deref(), Some("chain link mismatch at sequence 4"));

        let gap = VerificationReport::broken(
            2,
            ChainFault::SequenceGap { expected: 2, found: 3 },
            1,
            None,
        );
        assert_eq!(gap.error_message.as_deref(), Some("sequence gap detected at sequence 2"));

        let tip = VerificationReport::broken(7, ChainFault::TipMismatch, 7, None);
        assert_eq!(tip.error_message.as_deref(), Some("chain tip mismatch at sequence 7"));
    }

    #[test]
    fn valid_report_has_no_finding() {
        let report = VerificationReport::valid(0, None);
        assert!(report.is_valid);
        assert_eq!(report.broken_at, None);
        assert_eq!(report.error_message, None);
        assert_eq!(report.fault, None);
    }

    // ── LedgerError display messages ─────────────────────────────────────────

    #[test]
    fn error_hash_computation_display() {
        let err = LedgerError::HashComputation { reason: "empty table name".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("hash computation failed"));
        assert!(msg.contains("empty table name"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_concurrent_append_conflict_is_retryable() {
        let err = LedgerError::ConcurrentAppendConflict { reason: "tip moved".to_string() };
        assert!(err.to_string().contains("concurrent append conflict"));
        assert!(err.is_retryable());
    }

    #[test]
    fn error_immutable_record_display() {
        let err = LedgerError::ImmutableRecord {
            sequence: 5,
            reason: "audit records are append-only".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sequence 5"));
        assert!(msg.contains("append-only"));
    }

    #[test]
    fn error_invalid_range_display() {
        let err = LedgerError::InvalidRange { from: 9, to: 3 };
        assert_eq!(err.to_string(), "invalid sequence range 9..=3");
    }
}
