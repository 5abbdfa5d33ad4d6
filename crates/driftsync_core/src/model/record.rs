//! Tracked record domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by all change-tracked object types.
//! - Provide lifecycle helpers for soft-delete semantics.
//! - Decide per record whether a mutation is revision-worthy.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another record.
//! - `is_deleted` is the source of truth for tombstone state.
//! - `attributes` never shadows the reserved snapshot keys `id` / `object`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every change-tracked record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RecordId = Uuid;

/// Free-form JSON fields carried by a record.
///
/// `serde_json::Map` keeps keys sorted, so two records with equal field
/// values always produce structurally identical encodings.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Snapshot keys owned by the encoder; record attributes must not use them.
pub const RESERVED_ATTRIBUTE_KEYS: &[&str] = &["id", "object"];

/// Object type tag for change-tracked records.
///
/// The tag doubles as the `object_type` of every revision entry written
/// for the record, and as the `object` field of its encoded snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// A mail message with address, subject and body fields.
    Message,
    /// Aggregation of messages presented as one conversation.
    Thread,
    /// An address-book entry.
    Contact,
    /// A message part stored as a blob reference.
    Attachment,
}

impl RecordType {
    /// Returns the stable string tag used in storage and snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Thread => "thread",
            Self::Contact => "contact",
            Self::Attachment => "attachment",
        }
    }

    /// Parses a stored string tag back into a record type.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "message" => Some(Self::Message),
            "thread" => Some(Self::Thread),
            "contact" => Some(Self::Contact),
            "attachment" => Some(Self::Attachment),
            _ => None,
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for record write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    InvalidNamespace(i64),
    ReservedAttributeKey(String),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNamespace(id) => {
                write!(f, "record namespace_id must be positive, got {id}")
            }
            Self::ReservedAttributeKey(key) => {
                write!(f, "record attribute key `{key}` is reserved for snapshots")
            }
        }
    }
}

impl Error for RecordValidationError {}

/// Canonical change-tracked domain record.
///
/// One storage shape supports every tracked object type; type-specific
/// fields live in `attributes` so the change log and snapshot encoder
/// never need per-type schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable global ID used for revision references and delta payloads.
    pub uuid: RecordId,
    /// Owning namespace; every revision entry for this record carries it.
    pub namespace_id: i64,
    /// Serialized as `type` to match the storage column name.
    #[serde(rename = "type")]
    pub kind: RecordType,
    /// Free-form JSON fields exposed through snapshots.
    pub attributes: Attributes,
    /// Soft delete tombstone; deleted records stay in storage for the log.
    pub is_deleted: bool,
}

impl Record {
    /// Creates a new record with a generated stable ID.
    pub fn new(namespace_id: i64, kind: RecordType) -> Self {
        Self::with_id(Uuid::new_v4(), namespace_id, kind)
    }

    /// Creates a new record with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(uuid: RecordId, namespace_id: i64, kind: RecordType) -> Self {
        Self {
            uuid,
            namespace_id,
            kind,
            attributes: Attributes::new(),
            is_deleted: false,
        }
    }

    /// Marks this record as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    /// Clears the soft delete flag.
    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    /// Returns whether this record should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Returns whether mutations to this record belong in the change log.
    ///
    /// Attachments are only externally visible when they are actual
    /// attachments; a missing or malformed `is_attachment` flag falls back
    /// to logging the record rather than silently dropping it.
    pub fn should_create_revision(&self) -> bool {
        match self.kind {
            RecordType::Attachment => match self.attributes.get("is_attachment") {
                Some(serde_json::Value::Bool(flag)) => *flag,
                _ => true,
            },
            _ => true,
        }
    }

    /// Validates invariants enforced on every repository write.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.namespace_id <= 0 {
            return Err(RecordValidationError::InvalidNamespace(self.namespace_id));
        }
        for key in RESERVED_ATTRIBUTE_KEYS {
            if self.attributes.contains_key(*key) {
                return Err(RecordValidationError::ReservedAttributeKey(key.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordType, RecordValidationError};
    use serde_json::{json, Value};

    #[test]
    fn new_record_is_active_and_validates() {
        let record = Record::new(1, RecordType::Message);
        assert!(record.is_active());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_namespace() {
        let record = Record::new(0, RecordType::Contact);
        assert_eq!(
            record.validate(),
            Err(RecordValidationError::InvalidNamespace(0))
        );
    }

    #[test]
    fn validate_rejects_reserved_attribute_keys() {
        let mut record = Record::new(1, RecordType::Message);
        record
            .attributes
            .insert("id".to_string(), Value::String("boom".to_string()));
        assert_eq!(
            record.validate(),
            Err(RecordValidationError::ReservedAttributeKey("id".to_string()))
        );
    }

    #[test]
    fn attachment_opt_out_follows_is_attachment_flag() {
        let mut attachment = Record::new(1, RecordType::Attachment);
        assert!(attachment.should_create_revision());

        attachment
            .attributes
            .insert("is_attachment".to_string(), Value::Bool(false));
        assert!(!attachment.should_create_revision());

        attachment
            .attributes
            .insert("is_attachment".to_string(), Value::Bool(true));
        assert!(attachment.should_create_revision());
    }

    #[test]
    fn malformed_opt_out_flag_defaults_to_revision_worthy() {
        let mut attachment = Record::new(1, RecordType::Attachment);
        attachment
            .attributes
            .insert("is_attachment".to_string(), json!("yes"));
        assert!(attachment.should_create_revision());
    }

    #[test]
    fn soft_delete_and_restore_flip_tombstone() {
        let mut record = Record::new(1, RecordType::Thread);
        record.soft_delete();
        assert!(record.is_deleted);
        record.restore();
        assert!(record.is_active());
    }
}
