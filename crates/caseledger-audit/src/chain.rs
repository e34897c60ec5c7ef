//! Chain linker: binds a record's content hash to its predecessor.
//!
//! Link input layout (bytes, in order):
//!   1. `CHAIN_LINK_VERSION` as UTF-8
//!   2. `0x20`
//!   3. content hash, 32 raw bytes
//!   4. `0x20`
//!   5. predecessor chain hash (or genesis), 32 raw bytes
//!
//! Both digests are fixed-width, so no boundary can be shifted between them.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use caseledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{AuditRecord, NewAuditRecord, RecordId},
};

use crate::hasher::{content_hash, HashInput};

/// Version tag mixed into every chain hash.
pub const CHAIN_LINK_VERSION: &str = "caseledger.chain.v1";

const SEPARATOR: u8 = 0x20;

/// Compute `chain_hash = H(content_hash || prev_chain_hash)`.
///
/// Pass `AuditRecord::GENESIS_HASH` as `prev_chain_hash` for the first
/// record.  Returns a lowercase 64-character hex string.
///
/// # Errors
///
/// `LedgerError::HashComputation` if either argument is not 64 hex chars.
pub fn link(content_hash: &str, prev_chain_hash: &str) -> LedgerResult<String> {
    let content = decode_digest("content_hash", content_hash)?;
    let prev = decode_digest("prev_chain_hash", prev_chain_hash)?;

    let mut hasher = Sha256::new();
    hasher.update(CHAIN_LINK_VERSION.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(content);
    hasher.update([SEPARATOR]);
    hasher.update(prev);

    Ok(hex::encode(hasher.finalize()))
}

/// Turn a placed candidate into a fully hashed, linked record.
///
/// Stores call this inside their atomic append, after reading the tip.
pub fn seal(
    candidate: NewAuditRecord,
    sequence: u64,
    occurred_at: DateTime<Utc>,
    prev_chain_hash: &str,
) -> LedgerResult<AuditRecord> {
    let id = RecordId::new();
    let content_hash = content_hash(&HashInput::from_candidate(
        &candidate,
        sequence,
        &id,
        &occurred_at,
    ))?;
    let chain_hash = link(&content_hash, prev_chain_hash)?;

    Ok(AuditRecord {
        sequence,
        id,
        actor_id: candidate.actor_id,
        table_name: candidate.table_name,
        record_id: candidate.record_id,
        operation: candidate.operation,
        changed_fields: candidate.changed_fields,
        occurred_at,
        idempotency_key: candidate.idempotency_key,
        content_hash,
        chain_hash,
    })
}

fn decode_digest(label: &str, hex_digest: &str) -> LedgerResult<[u8; 32]> {
    let bytes = hex::decode(hex_digest).map_err(|e| LedgerError::HashComputation {
        reason: format!("{label} is not valid hex: {e}"),
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| LedgerError::HashComputation {
        reason: format!("{label} must be 32 bytes, got {}", bytes.len()),
    })
}
