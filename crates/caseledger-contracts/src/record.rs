//! The audit record model.
//!
//! `NewAuditRecord` is what a business action hands to the recorder.
//! `AuditRecord` is what the store hands back once the record is sequenced,
//! timestamped, hashed and linked into the chain.  Records are never
//! modified after that point.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque, never-reused identifier of one audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub uuid::Uuid);

impl RecordId {
    /// Create a new, unique record ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of change an audit record documents.
///
/// Serialized as its upper-case label (`"CREATE"`, `"UPDATE"`, `"DELETE"`).
/// `Other` carries any additional label verbatim, so the set can grow
/// without a schema change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Other(String),
}

impl Operation {
    /// The canonical label used in storage and in the content hash.
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Other(label) => label,
        }
    }
}

impl From<&str> for Operation {
    fn from(label: &str) -> Self {
        match label {
            "CREATE" => Operation::Create,
            "UPDATE" => Operation::Update,
            "DELETE" => Operation::Delete,
            other => Operation::Other(other.to_string()),
        }
    }
}

impl From<String> for Operation {
    fn from(label: String) -> Self {
        Operation::from(label.as_str())
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Before/after values of one field touched by the audited action.
///
/// Either side may be absent: a CREATE has no `old_value`, a DELETE has no
/// `new_value`.  An absent side is omitted when serialized, so an explicit
/// JSON `null` stays distinct from "no value".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub new_value: Option<Value>,
}

/// A key that is present always yields `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl FieldChange {
    pub fn set(new_value: Value) -> Self {
        Self { old_value: None, new_value: Some(new_value) }
    }

    pub fn changed(old_value: Value, new_value: Value) -> Self {
        Self { old_value: Some(old_value), new_value: Some(new_value) }
    }

    pub fn cleared(old_value: Value) -> Self {
        Self { old_value: Some(old_value), new_value: None }
    }
}

/// Field name → change, iterated in key order.
///
/// The key order is the order the hasher serializes the fields in.
pub type ChangedFields = BTreeMap<String, FieldChange>;

/// A candidate record, as supplied by the business action layer.
///
/// The store assigns `sequence`, `id`, `occurred_at` and both hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    /// The user who performed the action; `None` for system-initiated actions.
    pub actor_id: Option<String>,
    /// Logical entity / table affected (e.g. `"cases"`).
    pub table_name: String,
    /// Identifier of the affected row.
    pub record_id: String,
    pub operation: Operation,
    #[serde(default)]
    pub changed_fields: ChangedFields,
    /// Caller-chosen key that makes retried appends exactly-once in effect.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewAuditRecord {
    pub fn new(
        table_name: impl Into<String>,
        record_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            actor_id: None,
            table_name: table_name.into(),
            record_id: record_id.into(),
            operation,
            changed_fields: ChangedFields::new(),
            idempotency_key: None,
        }
    }

    /// Attribute the action to a user.
    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Add (or replace) one field change.
    pub fn change(mut self, field: impl Into<String>, change: FieldChange) -> Self {
        self.changed_fields.insert(field.into(), change);
        self
    }

    pub fn with_changes(mut self, changed_fields: ChangedFields) -> Self {
        self.changed_fields = changed_fields;
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// One immutable, chain-linked fact about one action on one entity.
///
/// Altering any field after the fact changes the recomputed `content_hash`,
/// which breaks this record's `chain_hash` and, transitively, every chain
/// hash after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Gap-free position in the chain, starting at 1.
    pub sequence: u64,
    pub id: RecordId,
    pub actor_id: Option<String>,
    pub table_name: String,
    pub record_id: String,
    pub operation: Operation,
    pub changed_fields: ChangedFields,
    /// Store clock at insertion, UTC, microsecond precision.
    pub occurred_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    /// SHA-256 (hex) of every field above in canonical form.
    pub content_hash: String,
    /// SHA-256 (hex) of `content_hash` linked to the predecessor's `chain_hash`.
    pub chain_hash: String,
}

impl AuditRecord {
    /// The predecessor chain hash used for the first record of every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// The checkpoint this record represents once it has been verified.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            sequence: self.sequence,
            chain_hash: self.chain_hash.clone(),
        }
    }
}

/// A chain position and its chain hash.
///
/// Used both as the store's tip and as the starting point of an incremental
/// verification run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    pub sequence: u64,
    pub chain_hash: String,
}
