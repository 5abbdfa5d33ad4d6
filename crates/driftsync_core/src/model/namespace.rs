//! Namespace scope model.
//!
//! Namespaces partition both records and the change feed; every revision
//! entry is stamped with the namespace of the record it describes.

use serde::{Deserialize, Serialize};

/// One tenant/scope boundary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Store-assigned integer id referenced by records and revisions.
    pub id: i64,
    /// Externally-facing opaque identifier.
    pub public_id: String,
    /// Human-readable label, unique per deployment by convention only.
    pub name: String,
}
