//! # caseledger-core
//!
//! The trust-boundary traits of the caseledger audit chain and the
//! `AuditRecorder` facade that business actions call.
//!
//! This crate provides:
//! - The core traits (`AuditStore`, `Clock`, `ModePolicy`, `Verifier`)
//! - The `AuditRecorder` that appends through a store with conflict retry
//!   and strict/lenient failure handling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caseledger_core::{AuditRecorder, traits::{AuditStore, ModePolicy}};
//! ```

pub mod recorder;
pub mod traits;

pub use recorder::{AuditRecorder, RecordOutcome, RecorderSettings};
