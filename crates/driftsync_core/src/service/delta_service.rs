//! Delta feed pagination over the revision log.
//!
//! # Responsibility
//! - Resolve opaque client cursors to internal sequence positions.
//! - Serve ordered, size-bounded pages of change deltas.
//! - Bootstrap cursors from wall-clock timestamps.
//!
//! # Invariants
//! - Concatenating successive pages yields the same sequence as one
//!   unbounded scan: no gaps, no duplicates, for any page size.
//! - An unknown cursor is a typed error, never a silent resync from the
//!   start of the log.
//! - An empty page returns `cursor_end == cursor_start`: the caller is
//!   caught up.

use crate::model::record::RecordType;
use crate::model::revision::{Command, RevisionEntry};
use crate::repo::record_repo::RepoError;
use crate::repo::revision_repo::RevisionRepository;
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Sentinel cursor meaning "start of the log".
pub const START_CURSOR: &str = "0";

const PAGE_LIMIT_DEFAULT: u32 = 100;
const PAGE_LIMIT_MAX: u32 = 500;

/// Errors surfaced to delta feed callers.
#[derive(Debug)]
pub enum DeltaError {
    /// The supplied cursor does not resolve to any entry in the requested
    /// namespace. Distinct from an empty page, which is not an error.
    InvalidCursor(String),
    Store(RepoError),
}

impl Display for DeltaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCursor(cursor) => write!(f, "invalid cursor: {cursor}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DeltaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCursor(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for DeltaError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Client-facing mutation event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaEvent {
    Create,
    Update,
    Delete,
}

impl From<Command> for DeltaEvent {
    fn from(command: Command) -> Self {
        match command {
            Command::Insert => Self::Create,
            Command::Update => Self::Update,
            Command::Delete => Self::Delete,
        }
    }
}

/// One change exposed to sync clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    /// Stable public id of the mutated record.
    pub id: String,
    pub object_type: RecordType,
    pub event: DeltaEvent,
    /// Full snapshot for create/update; omitted for delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Snapshot>,
}

/// One page of the delta feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaPage {
    pub cursor_start: String,
    pub deltas: Vec<Delta>,
    pub cursor_end: String,
}

/// Use-case service serving the resumable delta feed.
pub struct DeltaService<R: RevisionRepository> {
    repo: R,
}

impl<R: RevisionRepository> DeltaService<R> {
    /// Creates a service using the provided revision log repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns up to `limit` deltas after `cursor_start` within a namespace.
    ///
    /// `cursor_start` is either the start-of-log sentinel or a public id
    /// previously handed out by this API; anything else is
    /// `DeltaError::InvalidCursor`. The returned `cursor_end` continues
    /// the scan, and equals `cursor_start` when the caller is caught up.
    pub fn page(
        &self,
        namespace_id: i64,
        cursor_start: &str,
        limit: Option<u32>,
    ) -> Result<DeltaPage, DeltaError> {
        let after_id = self.resolve_cursor(namespace_id, cursor_start)?;
        let entries = self
            .repo
            .entries_after(namespace_id, after_id, effective_limit(limit))?;

        let cursor_end = entries
            .last()
            .map(|entry| entry.public_id.clone())
            .unwrap_or_else(|| cursor_start.to_string());

        Ok(DeltaPage {
            cursor_start: cursor_start.to_string(),
            deltas: entries.into_iter().map(delta_from_entry).collect(),
            cursor_end,
        })
    }

    /// Returns a cursor positioned at the most recent entry strictly
    /// before `unix_time` (seconds), or the start sentinel if none exists.
    ///
    /// Lets a client bootstrap from a wall-clock point instead of
    /// replaying the whole log.
    pub fn cursor_for_timestamp(
        &self,
        namespace_id: i64,
        unix_time: i64,
    ) -> Result<String, DeltaError> {
        match self.repo.last_before(namespace_id, unix_time * 1000)? {
            Some(entry) => Ok(entry.public_id),
            None => Ok(START_CURSOR.to_string()),
        }
    }

    fn resolve_cursor(&self, namespace_id: i64, cursor: &str) -> Result<i64, DeltaError> {
        if cursor == START_CURSOR {
            return Ok(0);
        }
        match self.repo.find_by_public_id(namespace_id, cursor)? {
            Some(entry) => Ok(entry.id),
            None => Err(DeltaError::InvalidCursor(cursor.to_string())),
        }
    }
}

fn effective_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(PAGE_LIMIT_DEFAULT).clamp(1, PAGE_LIMIT_MAX)
}

fn delta_from_entry(entry: RevisionEntry) -> Delta {
    let attributes = match entry.command {
        Command::Insert | Command::Update => entry.snapshot,
        Command::Delete => None,
    };
    Delta {
        id: entry.record_id.to_string(),
        object_type: entry.object_type,
        event: DeltaEvent::from(entry.command),
        attributes,
    }
}
