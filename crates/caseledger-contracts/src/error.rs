//! Error taxonomy for the caseledger audit engine.
//!
//! Append-time failures are returned as `LedgerError` and propagate to the
//! business action that asked for the audit record.  A broken chain is NOT
//! an error: verification findings are returned as a `VerificationReport`.

use thiserror::Error;

/// The unified error type for the caseledger crates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Canonicalization or digest computation failed on malformed input.
    ///
    /// Fatal for the append that produced it: the business action is not
    /// audited.
    #[error("hash computation failed: {reason}")]
    HashComputation { reason: String },

    /// Another writer advanced the chain tip between our read and our write.
    ///
    /// Recoverable: retry the append against the refreshed tip.
    #[error("concurrent append conflict: {reason}")]
    ConcurrentAppendConflict { reason: String },

    /// The persistence layer could not be reached or failed mid-operation.
    #[error("audit store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Something attempted to rewrite or remove a committed record.
    #[error("audit record at sequence {sequence} is immutable: {reason}")]
    ImmutableRecord { sequence: u64, reason: String },

    /// A range read was asked for with `from > to`.
    #[error("invalid sequence range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl LedgerError {
    /// True for failures a caller may resolve by simply trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrentAppendConflict { .. })
    }
}

/// Convenience alias used throughout the caseledger crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
