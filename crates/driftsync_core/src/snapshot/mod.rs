//! Snapshot encoding and structural diffing.
//!
//! # Responsibility
//! - Define the externally-stable snapshot representation of a record.
//! - Provide the injectable encoder seam used by revision capture.
//! - Compute field-level differences between two snapshots.
//!
//! # Invariants
//! - Encoding is a pure function of record state; equal states encode to
//!   structurally identical snapshots.
//! - Every snapshot carries the record's public `id` and an `object` type
//!   tag so feed consumers can route entries.

use crate::model::record::Record;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Externally-visible representation of a record at a point in time.
///
/// `serde_json::Map` keeps keys in sorted order, which makes encodings
/// deterministic and field-by-field comparable.
pub type Snapshot = serde_json::Map<String, Value>;

/// Snapshot encoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A record attribute shadows a key owned by the encoder.
    ReservedKey(String),
    /// Failure reported by an application-supplied encoder.
    Encoder(String),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReservedKey(key) => {
                write!(f, "record attribute `{key}` collides with a snapshot key")
            }
            Self::Encoder(message) => write!(f, "snapshot encoder failed: {message}"),
        }
    }
}

impl Error for SnapshotError {}

/// Injectable record-to-snapshot encoder.
///
/// Revision capture owns when to encode; the application layer owns how.
/// Implementations must be deterministic for a given record state.
pub trait SnapshotEncoder {
    fn encode(&self, record: &Record) -> Result<Snapshot, SnapshotError>;
}

/// Default encoder producing the API representation of a record.
///
/// The snapshot is the record's attributes plus the reserved `id` and
/// `object` routing keys, and optionally the public id of the scoping
/// namespace when one was supplied.
#[derive(Debug, Clone, Default)]
pub struct ApiSnapshotEncoder {
    namespace_public_id: Option<String>,
}

impl ApiSnapshotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder that stamps snapshots with a namespace public id.
    pub fn scoped(namespace_public_id: impl Into<String>) -> Self {
        Self {
            namespace_public_id: Some(namespace_public_id.into()),
        }
    }
}

impl SnapshotEncoder for ApiSnapshotEncoder {
    fn encode(&self, record: &Record) -> Result<Snapshot, SnapshotError> {
        let mut snapshot = Snapshot::new();
        snapshot.insert("id".to_string(), Value::String(record.uuid.to_string()));
        snapshot.insert(
            "object".to_string(),
            Value::String(record.kind.as_str().to_string()),
        );
        if let Some(namespace_public_id) = &self.namespace_public_id {
            snapshot.insert(
                "namespace_id".to_string(),
                Value::String(namespace_public_id.clone()),
            );
        }
        for (key, value) in &record.attributes {
            if snapshot.contains_key(key) {
                return Err(SnapshotError::ReservedKey(key.clone()));
            }
            snapshot.insert(key.clone(), value.clone());
        }
        Ok(snapshot)
    }
}

/// Returns the key-value pairs in `current` that differ from `previous`.
///
/// An empty result means the two snapshots are externally identical and
/// the corresponding update is not revision-worthy.
pub fn snapshot_delta(current: &Snapshot, previous: &Snapshot) -> Snapshot {
    current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
