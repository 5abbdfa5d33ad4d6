//! Revision entry domain model.
//!
//! # Responsibility
//! - Define the immutable change-log entry appended per meaningful mutation.
//! - Map mutation commands to/from their stored string tags.
//!
//! # Invariants
//! - `id` is the store-assigned sequence number; ascending `id` order is the
//!   total order of the log within a namespace.
//! - `public_id` is assigned exactly once and doubles as the cursor value.
//! - `snapshot` is present for insert/update commands and absent for delete.

use crate::model::record::{RecordId, RecordType};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Mutation command recorded by a revision entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Insert,
    Update,
    Delete,
}

impl Command {
    /// Returns the stable string tag stored in the `command` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parses a stored command tag.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed change-log entry, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEntry {
    /// Store-assigned sequence id defining the total order of the log.
    pub id: i64,
    /// Opaque externally-facing identifier used as a pagination cursor.
    pub public_id: String,
    /// Namespace of the described record, denormalized for filtered scans.
    pub namespace_id: i64,
    /// Type tag of the described record.
    pub object_type: RecordType,
    /// Stable id of the described record.
    pub record_id: RecordId,
    /// Mutation command.
    pub command: Command,
    /// Externally-visible representation at capture time; `None` for deletes.
    pub snapshot: Option<Snapshot>,
    /// Append time in epoch milliseconds, used for cursor bootstrap lookups.
    pub created_at: i64,
}

/// Fields supplied by revision capture when appending one entry.
///
/// Sequence id, public id and timestamp are assigned by the store at
/// append time and are deliberately absent here.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRevision {
    pub namespace_id: i64,
    pub object_type: RecordType,
    pub record_id: RecordId,
    pub command: Command,
    pub snapshot: Option<Snapshot>,
}
