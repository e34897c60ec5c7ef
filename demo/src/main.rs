//! caseledger CLI
//!
//! Runs the legal-practice reference scenarios, and administers a SQLite
//! audit chain: record an action, list records, verify, export a snapshot.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- tamper-drill
//!   cargo run -p demo -- --db ledger.db record --actor user-3 --table cases \
//!       --record-id case-17 --operation UPDATE --set status='"active"'
//!   cargo run -p demo -- --db ledger.db verify
//!   cargo run -p demo -- --config caseledger.toml export > snapshot.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use caseledger_audit::{ChainSnapshot, ChainVerifier, SqliteAuditStore};
use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{Checkpoint, FieldChange, NewAuditRecord, Operation},
};
use caseledger_core::{
    traits::{AuditStore, Verifier},
    AuditRecorder, RecordOutcome,
};
use caseledger_policy::{LedgerConfig, TomlModePolicy};
use caseledger_ref_legal::scenarios::{case_intake, concurrent_desk, tamper_drill};

// ── CLI definition ────────────────────────────────────────────────────────────

/// caseledger: tamper-evident audit chain for legal-practice records.
#[derive(Parser)]
#[command(
    name = "caseledger",
    about = "Tamper-evident audit chain for legal-practice records",
    long_about = "Runs the caseledger reference scenarios and administers a SQLite\n\
                  audit chain: record actions, list records, verify the chain and\n\
                  export offline-verifiable snapshots."
)]
struct Cli {
    /// caseledger TOML configuration (recorder, verifier, store, rules).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite audit database; overrides `[store] path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three reference scenarios in sequence.
    RunAll,
    /// Scenario 1: Case Intake (recorder, idempotency, lenient call site).
    CaseIntake,
    /// Scenario 2: Tamper Drill (bypassed guards, rewrite and delete detection).
    TamperDrill,
    /// Scenario 3: Concurrent Desk (parallel appends, incremental verification).
    ConcurrentDesk,
    #[command(flatten)]
    Ledger(LedgerCommand),
}

/// Commands that operate on a configured SQLite audit chain.
#[derive(Subcommand)]
enum LedgerCommand {
    /// Record one action into the audit chain.
    Record {
        /// Acting user; omit for system actions.
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        table: String,
        #[arg(long)]
        record_id: String,
        /// CREATE, UPDATE, DELETE or a custom label.
        #[arg(long)]
        operation: String,
        /// FIELD=JSON: a field's new value (repeatable).
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
        /// FIELD=JSON: a field's value before it was removed (repeatable).
        #[arg(long = "unset", value_parser = parse_assignment)]
        unset: Vec<(String, Value)>,
        /// Client-supplied key; resubmitting it returns the stored record.
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Print records in a sequence range.
    List {
        #[arg(long, default_value_t = 1)]
        from: u64,
        /// Defaults to the chain tip.
        #[arg(long)]
        to: Option<u64>,
    },
    /// Verify the chain, in full or from a trusted checkpoint.
    Verify {
        #[arg(long, requires = "from_hash")]
        from_sequence: Option<u64>,
        #[arg(long, requires = "from_sequence")]
        from_hash: Option<String>,
    },
    /// Write a JSON snapshot of the chain to stdout.
    Export,
}

/// Parse `FIELD=JSON`.  A value that is not valid JSON is taken as a string.
fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (field, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", s))?;
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.to_string(), value))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => scenarios(run_all),
        Command::CaseIntake => scenarios(case_intake::run_scenario),
        Command::TamperDrill => scenarios(tamper_drill::run_scenario),
        Command::ConcurrentDesk => scenarios(concurrent_desk::run_scenario),
        Command::Ledger(command) => {
            Ledger::open(cli.config.as_deref(), cli.db).and_then(|ledger| ledger.run(command))
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("caseledger error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn scenarios(run: fn() -> LedgerResult<()>) -> LedgerResult<bool> {
    print_banner();
    run()?;
    println!("All selected scenarios completed successfully.");
    Ok(true)
}

fn run_all() -> LedgerResult<()> {
    case_intake::run_scenario()?;
    tamper_drill::run_scenario()?;
    concurrent_desk::run_scenario()?;
    Ok(())
}

// ── Ledger administration ─────────────────────────────────────────────────────

/// A configured SQLite audit chain.
struct Ledger {
    config: LedgerConfig,
    store: Arc<SqliteAuditStore>,
}

impl Ledger {
    fn open(config_path: Option<&Path>, db: Option<PathBuf>) -> LedgerResult<Self> {
        let config = match config_path {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration");
                LedgerConfig::from_file(path)?
            }
            None => LedgerConfig::default(),
        };
        let path = db.or_else(|| config.store.path.clone()).ok_or_else(|| {
            LedgerError::ConfigError {
                reason: "no audit database: pass --db or set [store] path".to_string(),
            }
        })?;
        let store = Arc::new(SqliteAuditStore::open(&path)?);
        Ok(Self { config, store })
    }

    fn verifier(&self) -> ChainVerifier {
        ChainVerifier::with_batch_size(self.config.verifier.batch_size)
    }

    /// Returns `Ok(false)` when the command ran but found the chain broken.
    fn run(self, command: LedgerCommand) -> LedgerResult<bool> {
        match command {
            LedgerCommand::Record { actor, table, record_id, operation, set, unset, idempotency_key } => {
                let mut candidate = NewAuditRecord::new(table, record_id, Operation::from(operation));
                candidate.actor_id = actor;
                candidate.idempotency_key = idempotency_key;
                for (field, value) in set {
                    candidate = candidate.change(field, FieldChange::set(value));
                }
                for (field, value) in unset {
                    candidate = candidate.change(field, FieldChange::cleared(value));
                }
                self.record(candidate)
            }
            LedgerCommand::List { from, to } => self.list(from, to),
            LedgerCommand::Verify { from_sequence, from_hash } => {
                let checkpoint = from_sequence
                    .zip(from_hash)
                    .map(|(sequence, chain_hash)| Checkpoint { sequence, chain_hash });
                self.verify(checkpoint)
            }
            LedgerCommand::Export => {
                let snapshot = ChainSnapshot::capture(self.store.as_ref())?;
                println!("{}", snapshot.to_json()?);
                Ok(true)
            }
        }
    }

    fn record(&self, candidate: NewAuditRecord) -> LedgerResult<bool> {
        let policy = TomlModePolicy::from_config(&self.config);
        let recorder =
            AuditRecorder::new(self.store.clone(), Box::new(policy), self.config.recorder.clone());

        match recorder.record_request(candidate)? {
            RecordOutcome::Recorded(record) => {
                println!("recorded #{} chain_hash={}", record.sequence, record.chain_hash);
                Ok(true)
            }
            RecordOutcome::Unrecorded { reason, error } => {
                eprintln!("not recorded ({}): {}", reason, error);
                Ok(false)
            }
        }
    }

    fn list(&self, from: u64, to: Option<u64>) -> LedgerResult<bool> {
        let to = match to {
            Some(to) => to,
            None => match self.store.tip()? {
                Some(tip) => tip.sequence,
                None => return Ok(true),
            },
        };
        for record in self.store.read_range(from, to)? {
            println!(
                "#{:<6} {} {:<24} {:<8} {:<24} actor={} fields={}",
                record.sequence,
                record.occurred_at.format("%Y-%m-%dT%H:%M:%SZ"),
                record.table_name,
                record.operation.as_str(),
                record.record_id,
                record.actor_id.as_deref().unwrap_or("system"),
                record.changed_fields.keys().cloned().collect::<Vec<_>>().join(","),
            );
        }
        Ok(true)
    }

    fn verify(&self, checkpoint: Option<Checkpoint>) -> LedgerResult<bool> {
        let verifier = self.verifier();
        let report = match &checkpoint {
            Some(checkpoint) => verifier.verify_from(self.store.as_ref(), checkpoint)?,
            None => verifier.verify(self.store.as_ref())?,
        };

        match &report.error_message {
            None => println!("chain valid: {} record(s) checked", report.records_checked),
            Some(message) => println!("chain BROKEN: {}", message),
        }
        if let Some(tip) = &report.verified_tip {
            println!("verified through #{} chain_hash={}", tip.sequence, tip.chain_hash);
        }
        Ok(report.is_valid)
    }
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("caseledger: Tamper-evident Audit Chain");
    println!("Legal-practice Reference Demo");
    println!("======================================");
    println!();
    println!("Every recorded action:");
    println!("  [1] gets the next gap-free sequence number");
    println!("  [2] content_hash = SHA-256 over its canonical fields");
    println!("  [3] chain_hash   = SHA-256 over content_hash and the previous chain_hash");
    println!("  [4] is appended; the store refuses UPDATE and DELETE");
    println!();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
