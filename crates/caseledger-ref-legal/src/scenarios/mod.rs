//! Legal-practice reference scenarios.
//!
//! Each scenario wires real caseledger components (store, recorder, mode
//! policy, verifier) to mock practice data and prints what happens.

pub mod case_intake;
pub mod concurrent_desk;
pub mod tamper_drill;

use std::sync::Arc;

use caseledger_audit::ChainVerifier;
use caseledger_contracts::{error::LedgerResult, verify::VerificationReport};
use caseledger_core::{traits::AuditStore, AuditRecorder};
use caseledger_policy::{LedgerConfig, TomlModePolicy};

/// The configuration shared by the scenarios.
pub const LEGAL_POLICY: &str = include_str!("../../policies/legal.toml");

/// A recorder over `store` configured from `LEGAL_POLICY`, plus the verifier
/// the same configuration describes.
pub fn legal_recorder(store: Arc<dyn AuditStore>) -> LedgerResult<(AuditRecorder, ChainVerifier)> {
    let config = LedgerConfig::from_toml_str(LEGAL_POLICY)?;
    let policy = TomlModePolicy::from_config(&config);
    let verifier = ChainVerifier::with_batch_size(config.verifier.batch_size);
    Ok((AuditRecorder::new(store, Box::new(policy), config.recorder), verifier))
}

/// The verifier `LEGAL_POLICY` describes.
pub fn legal_verifier() -> LedgerResult<ChainVerifier> {
    let config = LedgerConfig::from_toml_str(LEGAL_POLICY)?;
    Ok(ChainVerifier::with_batch_size(config.verifier.batch_size))
}

/// One line summarizing a verification report.
pub fn describe_report(report: &VerificationReport) -> String {
    match &report.error_message {
        None => format!("VALID ({} record(s) checked)", report.records_checked),
        Some(message) => format!(
            "BROKEN: {} ({} record(s) verified before the break)",
            message, report.records_checked
        ),
    }
}
