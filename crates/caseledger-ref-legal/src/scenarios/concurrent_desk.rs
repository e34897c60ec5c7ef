//! Scenario 3: Concurrent Desk
//!
//! Monday morning: several front-desk workstations log time entries and
//! close tasks at the same moment, all through one shared `AuditRecorder`
//! over one SQLite file.  Afterwards:
//!
//!   - every sequence from 1 to N is used exactly once
//!   - the full chain verifies
//!   - an incremental pass from a mid-chain checkpoint verifies the rest

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use caseledger_audit::SqliteAuditStore;
use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    verify::VerificationReport,
};
use caseledger_core::traits::{AuditStore, Verifier};
use tracing::warn;

use super::{describe_report, legal_recorder};
use crate::mock_data::desk_action;

pub const DESKS: usize = 4;
pub const ACTIONS_PER_DESK: usize = 15;

/// What the desks produced and what verification found.
#[derive(Debug)]
pub struct DeskSummary {
    pub records: u64,
    /// Sequences were exactly `1..=records`.
    pub contiguous: bool,
    pub full: VerificationReport,
    pub incremental: VerificationReport,
}

/// Run `desks` workstations of `actions` records each against `path`.
pub fn run_desks(path: &Path, desks: usize, actions: usize) -> LedgerResult<DeskSummary> {
    let store = Arc::new(SqliteAuditStore::open(path)?);
    let (recorder, verifier) = legal_recorder(store.clone())?;

    let failures: Vec<LedgerError> = thread::scope(|s| {
        let handles: Vec<_> = (0..desks)
            .map(|desk| {
                let recorder = &recorder;
                s.spawn(move || -> LedgerResult<()> {
                    for n in 0..actions {
                        recorder.record_request(desk_action(desk, n))?;
                    }
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(_) => Some(LedgerError::StoreUnavailable {
                    reason: "desk thread panicked".to_string(),
                }),
            })
            .collect()
    });
    if let Some(first) = failures.into_iter().next() {
        warn!(error = %first, "desk failed to record");
        return Err(first);
    }

    let records = store.len()?;
    let sequences: BTreeSet<u64> =
        store.read_range(1, records.max(1))?.iter().map(|r| r.sequence).collect();
    let contiguous = sequences.len() as u64 == records && sequences.iter().copied().eq(1..=records);

    let full = verifier.verify(store.as_ref())?;

    let midpoint = (records / 2).max(1);
    let incremental = match store.read_range(midpoint, midpoint)?.first() {
        Some(record) => verifier.verify_from(store.as_ref(), &record.checkpoint())?,
        None => full.clone(),
    };

    Ok(DeskSummary { records, contiguous, full, incremental })
}

fn desk_database() -> PathBuf {
    std::env::temp_dir().join(format!("caseledger-desk-{}.db", uuid::Uuid::new_v4()))
}

fn remove_database(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

/// Run Scenario 3: Concurrent Desk.
pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 3: Concurrent Desk ===");
    println!();
    println!("  {} desks x {} actions, one shared recorder", DESKS, ACTIONS_PER_DESK);
    println!();

    let path = desk_database();
    let summary = run_desks(&path, DESKS, ACTIONS_PER_DESK);
    remove_database(&path);
    let summary = summary?;

    println!("  Records appended:      {}", summary.records);
    println!(
        "  Sequences:             {}",
        if summary.contiguous { "1..=N, no gaps or duplicates" } else { "NOT CONTIGUOUS" }
    );
    println!("  Full verification:     {}", describe_report(&summary.full));
    println!("  From mid-checkpoint:   {}", describe_report(&summary.incremental));
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
