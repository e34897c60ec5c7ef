//! Simulated legal-practice data for the caseledger reference runtime.
//!
//! All data in this module is hardcoded and fictional.  It stands in for the
//! practice-management database whose mutations a real deployment audits.

use serde_json::{json, Value};

use caseledger_contracts::record::{ChangedFields, FieldChange, NewAuditRecord, Operation};

// ── Staff ─────────────────────────────────────────────────────────────────────

pub const INTAKE_CLERK: &str = "user-intake-okafor";
pub const ATTORNEY: &str = "user-attorney-lindqvist";
pub const PARALEGAL: &str = "user-paralegal-moreau";

// ── Clients & cases ───────────────────────────────────────────────────────────

/// A prospective client as captured at intake.
pub fn new_client(client_id: &str) -> Value {
    json!({
        "client_id": client_id,
        "display_name": "Harbourside Bakery Ltd.",
        "contact_email": "owner@harbourside.example",
        "conflict_check": "clear"
    })
}

/// A newly opened commercial lease dispute for `client_id`.
pub fn new_case(case_id: &str, client_id: &str) -> Value {
    json!({
        "case_id": case_id,
        "client_id": client_id,
        "title": "Harbourside Bakery v. Quayline Properties",
        "practice_area": "commercial-lease",
        "status": "intake",
        "responsible_attorney": ATTORNEY,
        "billing": { "arrangement": "hourly", "rate": 320, "currency": "EUR" }
    })
}

// ── Tasks & documents ─────────────────────────────────────────────────────────

/// The tasks opened on every new litigation matter.
///
/// Returns `(task_id, fields)` pairs.
pub fn intake_tasks(case_id: &str) -> Vec<(String, Value)> {
    [
        ("collect-lease", "Collect signed lease and all amendments", PARALEGAL, "2026-11-02"),
        ("limitation-check", "Confirm limitation period for breach claim", ATTORNEY, "2026-10-30"),
        ("engagement-letter", "Send engagement letter for signature", INTAKE_CLERK, "2026-10-24"),
    ]
    .into_iter()
    .map(|(slug, title, assignee, due)| {
        (
            format!("{case_id}-{slug}"),
            json!({ "case_id": case_id, "title": title, "assignee": assignee, "due_on": due }),
        )
    })
    .collect()
}

/// Metadata for the signed engagement letter uploaded to the case file.
pub fn engagement_letter(case_id: &str) -> Value {
    json!({
        "case_id": case_id,
        "file_name": "engagement-letter-signed.pdf",
        "mime_type": "application/pdf",
        "size_bytes": 184_311,
        "sha256": "5e2bf57d3f40c4b6df69a0dfc0d7d6b3c4e1a8f2d9b7e6c5a4f3e2d1c0b9a8f7"
    })
}

// ── Change sets ───────────────────────────────────────────────────────────────

/// Every top-level field of `entity` as a newly set value.
pub fn created_fields(entity: &Value) -> ChangedFields {
    match entity.as_object() {
        Some(object) => object
            .iter()
            .map(|(field, value)| (field.clone(), FieldChange::set(value.clone())))
            .collect(),
        None => ChangedFields::new(),
    }
}

/// Every top-level field of `entity` as a cleared value.
pub fn deleted_fields(entity: &Value) -> ChangedFields {
    match entity.as_object() {
        Some(object) => object
            .iter()
            .map(|(field, value)| (field.clone(), FieldChange::cleared(value.clone())))
            .collect(),
        None => ChangedFields::new(),
    }
}

/// The `n`th routine action a front-desk workstation records.
///
/// Desks alternate between logging time entries and updating task status so
/// that concurrent records differ in table, operation and fields.
pub fn desk_action(desk: usize, n: usize) -> NewAuditRecord {
    let actor = format!("user-desk-{desk}");
    if n % 2 == 0 {
        NewAuditRecord::new("time_entries", format!("te-{desk}-{n}"), Operation::Create)
            .by(actor)
            .change("minutes", FieldChange::set(json!(6 * (n + 1))))
            .change("narrative", FieldChange::set(json!(format!("Call with client, item {n}"))))
    } else {
        NewAuditRecord::new("tasks", format!("task-{desk}-{n}"), Operation::Update)
            .by(actor)
            .change("status", FieldChange::changed(json!("open"), json!("done")))
    }
}
