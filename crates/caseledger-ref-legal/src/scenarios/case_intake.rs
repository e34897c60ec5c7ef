//! Scenario 1: Case Intake
//!
//! A new client walks in.  The intake clerk opens the client and case, the
//! standard tasks are created, the signed engagement letter is filed and the
//! attorney activates the matter.  Every mutation goes through the
//! `AuditRecorder`, and the chain is verified at the end.
//!
//!   1. clients         CREATE
//!   2. cases           CREATE
//!   3-5. tasks         CREATE x3
//!   6. documents       CREATE
//!   7. cases           UPDATE  status intake → active (idempotent retry)
//!   8. tasks           DELETE  engagement-letter task closed out
//!   9. calendar_events SYNC    system action, lenient call site

use std::sync::Arc;

use serde_json::json;

use caseledger_audit::InMemoryAuditStore;
use caseledger_contracts::{
    error::LedgerResult,
    record::{AuditRecord, FieldChange, NewAuditRecord, Operation},
};
use caseledger_core::{traits::Verifier, AuditRecorder, RecordOutcome};

use super::{describe_report, legal_recorder};
use crate::mock_data::{
    created_fields, deleted_fields, engagement_letter, intake_tasks, new_case, new_client,
    ATTORNEY, INTAKE_CLERK,
};

/// Record the full intake of `case_id` and return the records in order.
pub fn record_intake(recorder: &AuditRecorder, case_id: &str) -> LedgerResult<Vec<AuditRecord>> {
    let client_id = format!("client-{case_id}");
    let mut records = Vec::new();

    let client = new_client(&client_id);
    let outcome = recorder.record(
        Some(INTAKE_CLERK),
        "clients",
        &client_id,
        Operation::Create,
        created_fields(&client),
    )?;
    records.extend(outcome.into_record());

    let case = new_case(case_id, &client_id);
    let outcome =
        recorder.record(Some(INTAKE_CLERK), "cases", case_id, Operation::Create, created_fields(&case))?;
    records.extend(outcome.into_record());

    let tasks = intake_tasks(case_id);
    for (task_id, task) in &tasks {
        let outcome =
            recorder.record(Some(INTAKE_CLERK), "tasks", task_id, Operation::Create, created_fields(task))?;
        records.extend(outcome.into_record());
    }

    let letter = engagement_letter(case_id);
    let document_id = format!("{case_id}-doc-engagement");
    let outcome = recorder.record(
        Some(INTAKE_CLERK),
        "documents",
        &document_id,
        Operation::Create,
        created_fields(&letter),
    )?;
    records.extend(outcome.into_record());

    // The activation is submitted twice (a double-clicked button); the
    // idempotency key keeps it to one record.
    let activation = NewAuditRecord::new("cases", case_id, Operation::Update)
        .by(ATTORNEY)
        .change("status", FieldChange::changed(json!("intake"), json!("active")))
        .idempotency_key(format!("activate-{case_id}"));
    let first = recorder.record_request(activation.clone())?;
    recorder.record_request(activation)?;
    records.extend(first.into_record());

    if let Some((task_id, task)) = tasks.iter().find(|(id, _)| id.ends_with("engagement-letter")) {
        let outcome =
            recorder.record(Some(ATTORNEY), "tasks", task_id, Operation::Delete, deleted_fields(task))?;
        records.extend(outcome.into_record());
    }

    let sync = NewAuditRecord::new("calendar_events", format!("{case_id}-hearing"), Operation::from("SYNC"))
        .change("starts_at", FieldChange::set(json!("2026-12-08T09:30:00Z")));
    match recorder.record_request(sync)? {
        RecordOutcome::Recorded(record) => records.push(record),
        RecordOutcome::Unrecorded { reason, .. } => {
            println!("  Calendar sync proceeded unaudited ({reason})");
        }
    }

    Ok(records)
}

/// Run Scenario 1: Case Intake.
pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 1: Case Intake ===");
    println!();

    let store = Arc::new(InMemoryAuditStore::new());
    let (recorder, verifier) = legal_recorder(store.clone())?;

    let records = record_intake(&recorder, "case-2026-0417")?;

    for record in &records {
        println!(
            "  #{:<3} {:<16} {:<7} {:<34} {}",
            record.sequence,
            record.table_name,
            record.operation.as_str(),
            record.record_id,
            record.chain_hash.get(..16).unwrap_or_default()
        );
    }
    println!();

    let report = verifier.verify(store.as_ref())?;
    println!("  Audit chain:  {}", describe_report(&report));
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use caseledger_core::traits::AuditStore;

    #[test]
    fn test_intake_records_every_action_once() {
        let store = Arc::new(InMemoryAuditStore::new());
        let (recorder, verifier) = legal_recorder(store.clone()).unwrap();

        let records = record_intake(&recorder, "case-1").unwrap();

        assert_eq!(records.len(), 9, "double-submitted activation must be recorded once");
        assert_eq!(store.len().unwrap(), 9);
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (1..=9).collect::<Vec<_>>());

        assert_eq!(records[0].table_name, "clients");
        assert_eq!(records[0].actor_id.as_deref(), Some(INTAKE_CLERK));
        assert_eq!(records[7].operation, Operation::Delete);
        assert_eq!(records[8].actor_id, None, "calendar sync is a system action");

        let report = verifier.verify(store.as_ref()).unwrap();
        assert!(report.is_valid, "{}", describe_report(&report));
    }

    #[test]
    fn test_intake_scenario_runs() {
        run_scenario().unwrap();
    }
}
