//! # caseledger-audit
//!
//! Immutable, append-only, SHA-256 hash-chained audit records for
//! caseledger.
//!
//! ## Overview
//!
//! Every action a business handler records becomes an `AuditRecord` whose
//! `content_hash` commits to its own fields and whose `chain_hash` commits
//! to its predecessor's `chain_hash`.  Editing, re-linking or removing any
//! record breaks the chain from that point on, and `ChainVerifier` reports
//! the first broken sequence.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caseledger_audit::{ChainVerifier, SqliteAuditStore};
//! use caseledger_contracts::record::{NewAuditRecord, Operation};
//! use caseledger_core::traits::{AuditStore, Verifier};
//!
//! let store = SqliteAuditStore::open("caseledger.db")?;
//! store.append(NewAuditRecord::new("cases", "case-17", Operation::Create).by("user-3"))?;
//!
//! let report = ChainVerifier::new().verify(&store)?;
//! assert!(report.is_valid);
//! ```

pub mod chain;
pub mod hasher;
pub mod memory;
pub mod snapshot;
pub mod sqlite;
pub mod verifier;

pub use chain::link;
pub use hasher::{content_hash, record_content_hash};
pub use memory::InMemoryAuditStore;
pub use snapshot::ChainSnapshot;
pub use sqlite::SqliteAuditStore;
pub use verifier::{verify_records, ChainVerifier};

// ── Tests ─────────────────────────────────────────────────────────────────────
