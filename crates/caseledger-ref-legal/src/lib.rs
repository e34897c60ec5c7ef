//! # caseledger-ref-legal
//!
//! Legal-practice reference runtime for the caseledger audit chain.
//!
//! Demonstrates three scenarios using mock data:
//!
//! 1. **Case Intake**: a client, a case and its first tasks are recorded
//!    through the `AuditRecorder`, then the chain is verified.
//! 2. **Tamper Drill**: a privileged raw SQLite connection bypasses the
//!    append-only guards; the verifier pinpoints the rewritten record and
//!    the deleted record.
//! 3. **Concurrent Desk**: several desks record at once into one store;
//!    the chain stays gap-free and verifies in full and incrementally.
//!
//! All data is hardcoded and fictional.

pub mod mock_data;
pub mod scenarios;
