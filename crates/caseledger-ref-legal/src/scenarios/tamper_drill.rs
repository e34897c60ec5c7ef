//! Scenario 2: Tamper Drill
//!
//! An auditor checks that history cannot be rewritten quietly.  The practice
//! database is a SQLite file; the drill opens a second, privileged raw
//! connection to it and:
//!
//!   1. tries an UPDATE with the guards in place → refused by the database
//!   2. drops the guard triggers and rewrites record #3's operation
//!      → verifier reports a content hash mismatch at sequence 3
//!   3. puts the original value back → chain verifies again
//!   4. deletes the record just before the tip
//!      → verifier reports a sequence gap at that sequence

use std::path::{Path, PathBuf};

use caseledger_audit::{sqlite::mutation_error, SqliteAuditStore};
use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    verify::VerificationReport,
};
use caseledger_core::traits::{AuditStore, Verifier};
use rusqlite::{params, Connection};

use super::{describe_report, legal_verifier};
use crate::mock_data::desk_action;

const REWRITTEN_SEQUENCE: u64 = 3;

/// What the verifier saw at each stage of the drill.
#[derive(Debug)]
pub struct DrillFindings {
    /// How the database refused an UPDATE while the guards were in place;
    /// `None` if it let the UPDATE through.
    pub guard_refusal: Option<LedgerError>,
    pub baseline: VerificationReport,
    pub after_rewrite: VerificationReport,
    pub after_revert: VerificationReport,
    pub after_delete: VerificationReport,
    /// Sequence of the record the drill deleted.
    pub deleted_sequence: u64,
}

fn raw_error(action: &str, e: rusqlite::Error) -> LedgerError {
    LedgerError::StoreUnavailable { reason: format!("tamper drill could not {}: {}", action, e) }
}

/// Run the drill against a fresh database at `path`.
pub fn run_drill(path: &Path) -> LedgerResult<DrillFindings> {
    let store = SqliteAuditStore::open(path)?;
    let verifier = legal_verifier()?;

    for n in 0..5 {
        store.append(desk_action(1, n))?;
    }
    let baseline = verifier.verify(&store)?;

    let raw = Connection::open(path).map_err(|e| raw_error("open a raw connection", e))?;

    let guard_refusal = raw
        .execute(
            "UPDATE audit_records SET operation = 'DELETE' WHERE sequence = ?1",
            params![REWRITTEN_SEQUENCE as i64],
        )
        .err()
        .map(|e| mutation_error(REWRITTEN_SEQUENCE, e));

    raw.execute_batch(
        "DROP TRIGGER IF EXISTS audit_records_no_update;
         DROP TRIGGER IF EXISTS audit_records_no_delete;",
    )
    .map_err(|e| raw_error("drop the guard triggers", e))?;

    let original: String = raw
        .query_row(
            "SELECT operation FROM audit_records WHERE sequence = ?1",
            params![REWRITTEN_SEQUENCE as i64],
            |row| row.get(0),
        )
        .map_err(|e| raw_error("read the target record", e))?;

    raw.execute(
        "UPDATE audit_records SET operation = 'DELETE' WHERE sequence = ?1",
        params![REWRITTEN_SEQUENCE as i64],
    )
    .map_err(|e| raw_error("rewrite the target record", e))?;
    let after_rewrite = verifier.verify(&store)?;

    raw.execute(
        "UPDATE audit_records SET operation = ?1 WHERE sequence = ?2",
        params![original, REWRITTEN_SEQUENCE as i64],
    )
    .map_err(|e| raw_error("restore the target record", e))?;
    let after_revert = verifier.verify(&store)?;

    let deleted_sequence = match store.tip()? {
        Some(tip) if tip.sequence > 1 => tip.sequence - 1,
        _ => 1,
    };
    raw.execute(
        "DELETE FROM audit_records WHERE sequence = ?1",
        params![deleted_sequence as i64],
    )
    .map_err(|e| raw_error("delete a record", e))?;
    let after_delete = verifier.verify(&store)?;

    Ok(DrillFindings {
        guard_refusal,
        baseline,
        after_rewrite,
        after_revert,
        after_delete,
        deleted_sequence,
    })
}

/// A database file under the system temp directory, unique per drill.
fn drill_database() -> PathBuf {
    std::env::temp_dir().join(format!("caseledger-drill-{}.db", uuid::Uuid::new_v4()))
}

fn remove_database(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

/// Run Scenario 2: Tamper Drill.
pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 2: Tamper Drill ===");
    println!();

    let path = drill_database();
    let findings = run_drill(&path);
    remove_database(&path);
    let findings = findings?;

    println!("  Baseline:                   {}", describe_report(&findings.baseline));
    match &findings.guard_refusal {
        Some(refusal) => println!("  UPDATE with guards in place: REFUSED ({})", refusal),
        None => println!("  UPDATE with guards in place: ALLOWED"),
    }
    println!(
        "  Record #{} rewritten:         {}",
        REWRITTEN_SEQUENCE,
        describe_report(&findings.after_rewrite)
    );
    println!("  Record restored:            {}", describe_report(&findings.after_revert));
    println!(
        "  Record #{} deleted:           {}",
        findings.deleted_sequence,
        describe_report(&findings.after_delete)
    );
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use caseledger_contracts::verify::ChainFault;

    #[test]
    fn test_drill_pinpoints_each_tampering() {
        let path = drill_database();
        let findings = run_drill(&path);
        remove_database(&path);
        let findings = findings.unwrap();

        assert!(
            matches!(
                findings.guard_refusal,
                Some(LedgerError::ImmutableRecord { sequence: REWRITTEN_SEQUENCE, .. })
            ),
            "guards must refuse UPDATE, got {:?}",
            findings.guard_refusal
        );
        assert!(findings.baseline.is_valid);

        assert_eq!(findings.after_rewrite.broken_at, Some(REWRITTEN_SEQUENCE));
        assert_eq!(
            findings.after_rewrite.error_message.as_deref(),
            Some("content hash mismatch at sequence 3")
        );

        assert!(findings.after_revert.is_valid, "restoring the bytes restores the chain");

        assert_eq!(findings.deleted_sequence, 4);
        assert_eq!(findings.after_delete.broken_at, Some(4));
        assert!(matches!(findings.after_delete.fault, Some(ChainFault::SequenceGap { .. })));
    }
}
