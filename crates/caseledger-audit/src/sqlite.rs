//! SQLite-backed implementation of `AuditStore`.
//!
//! The append-only rule is enforced by the database itself: triggers abort
//! every `UPDATE` and `DELETE` on `audit_records`, and any `INSERT` that does
//! not extend the tip by exactly one.  The tip lives in a one-row
//! `chain_head` table that may only move forward one step at a time.
//!
//! Appends run in an IMMEDIATE transaction, so the tip read, hash link,
//! insert and tip advance happen under the database write lock, across
//! connections and across processes.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{
    params, types::Type, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use tracing::{debug, info};

use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{AuditRecord, ChangedFields, Checkpoint, NewAuditRecord, Operation, RecordId},
};
use caseledger_core::traits::{AuditStore, Clock, SystemClock};

use crate::{
    chain::seal,
    hasher::{canonical_timestamp, store_timestamp},
    memory::describe_tip,
};

/// Trigger message for any attempt to rewrite history.
pub const APPEND_ONLY_MESSAGE: &str = "audit records are append-only";

/// Trigger message for an insert that does not extend the tip.
pub const NOT_TIP_MESSAGE: &str = "audit sequence must extend the tip";

/// How long a writer waits for another writer's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema for the audit ledger (table, index, guard triggers).
const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS audit_records (
        sequence        INTEGER PRIMARY KEY,
        id              TEXT NOT NULL UNIQUE,
        actor_id        TEXT,
        table_name      TEXT NOT NULL,
        record_id       TEXT NOT NULL,
        operation       TEXT NOT NULL,
        changed_fields  TEXT NOT NULL,
        occurred_at     TEXT NOT NULL,
        idempotency_key TEXT UNIQUE,
        content_hash    TEXT NOT NULL,
        chain_hash      TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_audit_records_entity
        ON audit_records(table_name, record_id);

    CREATE TRIGGER IF NOT EXISTS audit_records_no_update
    BEFORE UPDATE ON audit_records
    BEGIN
        SELECT RAISE(ABORT, 'audit records are append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS audit_records_no_delete
    BEFORE DELETE ON audit_records
    BEGIN
        SELECT RAISE(ABORT, 'audit records are append-only');
    END;

    CREATE TABLE IF NOT EXISTS chain_head (
        id         INTEGER PRIMARY KEY CHECK (id = 1),
        sequence   INTEGER NOT NULL,
        chain_hash TEXT NOT NULL
    );
    INSERT OR IGNORE INTO chain_head (id, sequence, chain_hash)
        VALUES (1, 0, '0000000000000000000000000000000000000000000000000000000000000000');

    CREATE TRIGGER IF NOT EXISTS audit_records_extend_tip
    BEFORE INSERT ON audit_records
    WHEN NEW.sequence != (SELECT sequence FROM chain_head WHERE id = 1) + 1
    BEGIN
        SELECT RAISE(ABORT, 'audit sequence must extend the tip');
    END;

    CREATE TRIGGER IF NOT EXISTS chain_head_advance_only
    BEFORE UPDATE ON chain_head
    WHEN NEW.sequence != OLD.sequence + 1
    BEGIN
        SELECT RAISE(ABORT, 'audit sequence must extend the tip');
    END;

    CREATE TRIGGER IF NOT EXISTS chain_head_no_delete
    BEFORE DELETE ON chain_head
    BEGIN
        SELECT RAISE(ABORT, 'audit records are append-only');
    END;
";

const SELECT_COLUMNS: &str = "sequence, id, actor_id, table_name, record_id, operation, \
     changed_fields, occurred_at, idempotency_key, content_hash, chain_hash";

/// An append-only, hash-chained audit store persisted in SQLite.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteAuditStore {
    /// Open (or create) the audit ledger at `path`.
    ///
    /// Enables WAL mode, sets a busy timeout and creates the table and guard
    /// triggers if they do not exist.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("failed to open audit database '{}': {e}", path.display()),
        })?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| map_sqlite_error("enable WAL", e))?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "opened sqlite audit store");
        Ok(store)
    }

    /// A private, non-persistent ledger (tests, demos).
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("failed to open in-memory audit database: {e}"),
        })?;
        Self::init(conn)
    }

    /// Replace the store clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn init(conn: Connection) -> LedgerResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| map_sqlite_error("set busy timeout", e))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| map_sqlite_error("create audit schema", e))?;
        Ok(Self { conn: Mutex::new(conn), clock: Arc::new(SystemClock) })
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("audit connection lock poisoned: {}", e),
        })
    }

    fn append_inner(
        &self,
        expected_tip: Option<Option<&Checkpoint>>,
        candidate: NewAuditRecord,
    ) -> LedgerResult<AuditRecord> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| map_sqlite_error("begin append", e))?;

        if let Some(key) = candidate.idempotency_key.as_deref() {
            if let Some(existing) = select_by_key(&tx, key)? {
                debug!(
                    idempotency_key = %key,
                    sequence = existing.sequence,
                    "idempotent append; returning stored record"
                );
                return Ok(existing);
            }
        }

        let tip = select_tip(&tx)?;
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
        insert(&tx, &record)?;
        advance_head(&tx, &record)?;
        tx.commit().map_err(|e| map_sqlite_error("commit append", e))?;

        Ok(record)
    }
}

// ── SQL helpers ───────────────────────────────────────────────────────────────

fn insert(conn: &Connection, record: &AuditRecord) -> LedgerResult<()> {
    let changed_fields =
        serde_json::to_string(&record.changed_fields).map_err(|e| LedgerError::HashComputation {
            reason: format!("changed_fields are not serializable: {e}"),
        })?;

    conn.execute(
        "INSERT INTO audit_records (sequence, id, actor_id, table_name, record_id, operation, \
         changed_fields, occurred_at, idempotency_key, content_hash, chain_hash) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            to_sql_sequence(record.sequence),
            record.id.to_string(),
            record.actor_id,
            record.table_name,
            record.record_id,
            record.operation.as_str(),
            changed_fields,
            canonical_timestamp(&record.occurred_at),
            record.idempotency_key,
            record.content_hash,
            record.chain_hash,
        ],
    )
    .map_err(|e| map_sqlite_error("insert audit record", e))?;
    Ok(())
}

fn advance_head(conn: &Connection, record: &AuditRecord) -> LedgerResult<()> {
    conn.execute(
        "UPDATE chain_head SET sequence = ?1, chain_hash = ?2 WHERE id = 1",
        params![to_sql_sequence(record.sequence), record.chain_hash],
    )
    .map_err(|e| map_sqlite_error("advance tip", e))?;
    Ok(())
}

/// The tip pointer; sequence 0 means the chain is empty.
fn select_tip(conn: &Connection) -> LedgerResult<Option<Checkpoint>> {
    let head = conn
        .query_row("SELECT sequence, chain_hash FROM chain_head WHERE id = 1", [], |row| {
            Ok(Checkpoint {
                sequence: from_sql_sequence(row.get(0)?),
                chain_hash: row.get(1)?,
            })
        })
        .optional()
        .map_err(|e| map_sqlite_error("read tip", e))?;
    Ok(head.filter(|head| head.sequence > 0))
}

fn select_by_key(conn: &Connection, key: &str) -> LedgerResult<Option<AuditRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM audit_records WHERE idempotency_key = ?1");
    conn.query_row(&sql, params![key], row_to_record)
        .optional()
        .map_err(|e| map_sqlite_error("look up idempotency key", e))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    let id: String = row.get(1)?;
    let id = uuid::Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    let operation: String = row.get(5)?;

    let changed_fields: String = row.get(6)?;
    let changed_fields: ChangedFields = serde_json::from_str(&changed_fields)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    let occurred_at: String = row.get(7)?;
    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(AuditRecord {
        sequence: from_sql_sequence(row.get(0)?),
        id: RecordId(id),
        actor_id: row.get(2)?,
        table_name: row.get(3)?,
        record_id: row.get(4)?,
        operation: Operation::from(operation),
        changed_fields,
        occurred_at,
        idempotency_key: row.get(8)?,
        content_hash: row.get(9)?,
        chain_hash: row.get(10)?,
    })
}

fn to_sql_sequence(sequence: u64) -> i64 {
    i64::try_from(sequence).unwrap_or(i64::MAX)
}

fn from_sql_sequence(sequence: i64) -> u64 {
    u64::try_from(sequence).unwrap_or(0)
}

/// Classify a SQLite failure into the ledger's error taxonomy.
fn map_sqlite_error(context: &str, e: rusqlite::Error) -> LedgerError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &e {
        let message = message.as_deref().unwrap_or_default();
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return LedgerError::ConcurrentAppendConflict {
                    reason: format!("{context}: {e}"),
                };
            }
            ErrorCode::ConstraintViolation if message.contains(NOT_TIP_MESSAGE) => {
                return LedgerError::ConcurrentAppendConflict {
                    reason: format!("{context}: {message}"),
                };
            }
            _ => {}
        }
    }
    LedgerError::StoreUnavailable { reason: format!("{context}: {e}") }
}

/// Classify the failure of a statement that targeted the record at
/// `sequence`, such as maintenance SQL run directly against the ledger
/// database.  A refusal by the append-only guards is `ImmutableRecord`.
pub fn mutation_error(sequence: u64, e: rusqlite::Error) -> LedgerError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &e {
        if failure.code == ErrorCode::ConstraintViolation && message.contains(APPEND_ONLY_MESSAGE) {
            return LedgerError::ImmutableRecord { sequence, reason: message.clone() };
        }
    }
    map_sqlite_error("mutate audit record", e)
}

// ── AuditStore impl ───────────────────────────────────────────────────────────

impl AuditStore for SqliteAuditStore {
    fn append(&self, candidate: NewAuditRecord) -> LedgerResult<AuditRecord> {
        self.append_inner(None, candidate)
    }

    fn append_after(
        &self,
        expected_tip: Option<&Checkpoint>,
        candidate: NewAuditRecord,
    ) -> LedgerResult<AuditRecord> {
        self.append_inner(Some(expected_tip), candidate)
    }

    fn read_range(&self, from: u64, to: u64) -> LedgerResult<Vec<AuditRecord>> {
        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM audit_records \
             WHERE sequence BETWEEN ?1 AND ?2 ORDER BY sequence ASC"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| map_sqlite_error("prepare range read", e))?;
        let rows = stmt
            .query_map(params![to_sql_sequence(from), to_sql_sequence(to)], row_to_record)
            .map_err(|e| map_sqlite_error("read range", e))?;

        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_sqlite_error("decode audit record", e))?;
        Ok(records)
    }

    fn tip(&self) -> LedgerResult<Option<Checkpoint>> {
        let conn = self.lock()?;
        select_tip(&conn)
    }

    fn len(&self) -> LedgerResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_records", [], |row| row.get(0))
            .map_err(|e| map_sqlite_error("count records", e))?;
        Ok(from_sql_sequence(count))
    }

    fn find_by_idempotency_key(&self, key: &str) -> LedgerResult<Option<AuditRecord>> {
        let conn = self.lock()?;
        select_by_key(&conn, key)
    }
}
