//! Revision capture: unit-of-work walking and mutation classification.
//!
//! # Responsibility
//! - Partition a committing unit-of-work's touched records into
//!   insert/update/delete revisions.
//! - Elide updates whose snapshot matches the last logged snapshot.
//! - Append entries through the revision log repository.
//!
//! # Invariants
//! - Capture runs inside the unit-of-work's own transaction; entries
//!   commit atomically with the records they describe.
//! - A snapshot encoding failure skips that one record with a warning;
//!   any store failure aborts the whole capture.
//! - The diff baseline is looked up per record, never reused across
//!   records in one pass.

use crate::model::record::Record;
use crate::model::revision::{Command, NewRevision};
use crate::repo::record_repo::RepoError;
use crate::repo::revision_repo::RevisionRepository;
use crate::snapshot::{snapshot_delta, Snapshot, SnapshotEncoder, SnapshotError};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How a record entered the unit-of-work's touched sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Newly created in this unit-of-work.
    Created,
    /// Modified in place (including soft-delete flag updates).
    Dirty,
    /// Physically removed from storage by a collaborator outside the
    /// normal write path.
    Removed,
}

/// The touched-record enumerations a unit-of-work exposes at commit time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TouchedRecords<'a> {
    pub created: &'a [Record],
    pub dirty: &'a [Record],
    pub removed: &'a [Record],
}

/// Capture failures that must abort the surrounding commit.
#[derive(Debug)]
pub enum CaptureError {
    Store(RepoError),
}

impl Display for CaptureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "revision capture store failure: {err}"),
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for CaptureError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Decides which revision command a touched record warrants, if any.
///
/// Returns `None` when the record opts out of the change log entirely.
/// Update-vs-noop elision is decided later, against the last logged
/// snapshot, because it needs a store read.
pub fn classify(record: &Record, origin: Origin) -> Option<Command> {
    if !record.should_create_revision() {
        return None;
    }
    match origin {
        Origin::Created => Some(Command::Insert),
        Origin::Dirty if record.is_deleted => Some(Command::Delete),
        Origin::Dirty => Some(Command::Update),
        Origin::Removed => Some(Command::Delete),
    }
}

/// Walks a unit-of-work's touched records and appends revision entries.
pub struct RevisionWriter<'a> {
    namespace_id: Option<i64>,
    encoder: &'a dyn SnapshotEncoder,
}

impl<'a> RevisionWriter<'a> {
    /// Creates a writer, optionally scoped to one ambient namespace.
    ///
    /// With a scope set, every entry is stamped with that namespace id
    /// instead of reading each record's own namespace.
    pub fn new(namespace_id: Option<i64>, encoder: &'a dyn SnapshotEncoder) -> Self {
        Self {
            namespace_id,
            encoder,
        }
    }

    /// Appends one entry per revision-worthy touched record.
    ///
    /// Returns the number of entries appended.
    pub fn create_revisions(
        &self,
        log: &dyn RevisionRepository,
        touched: &TouchedRecords<'_>,
    ) -> Result<usize, CaptureError> {
        let mut appended = 0;

        for record in touched.created {
            appended += usize::from(self.revise(log, record, Origin::Created)?);
        }
        for record in touched.dirty {
            appended += usize::from(self.revise(log, record, Origin::Dirty)?);
        }
        for record in touched.removed {
            appended += usize::from(self.revise(log, record, Origin::Removed)?);
        }

        Ok(appended)
    }

    fn revise(
        &self,
        log: &dyn RevisionRepository,
        record: &Record,
        origin: Origin,
    ) -> Result<bool, CaptureError> {
        match classify(record, origin) {
            None => Ok(false),
            Some(Command::Insert) => self.append_snapshotted(log, record, Command::Insert),
            Some(Command::Update) => self.append_update(log, record),
            Some(Command::Delete) => {
                log.append(&NewRevision {
                    namespace_id: self.entry_namespace(record),
                    object_type: record.kind,
                    record_id: record.uuid,
                    command: Command::Delete,
                    snapshot: None,
                })?;
                Ok(true)
            }
        }
    }

    fn append_update(
        &self,
        log: &dyn RevisionRepository,
        record: &Record,
    ) -> Result<bool, CaptureError> {
        let snapshot = match self.encode(record) {
            Some(snapshot) => snapshot,
            None => return Ok(false),
        };

        // Baseline is the most recently logged snapshot, not the pre-write
        // in-memory state; a prior delete entry has no snapshot to diff
        // against and a record without history logs unconditionally.
        if let Some(prior) = log.last_for_record(record.kind, record.uuid)? {
            if let Some(prior_snapshot) = &prior.snapshot {
                if snapshot_delta(&snapshot, prior_snapshot).is_empty() {
                    return Ok(false);
                }
            }
        }

        log.append(&NewRevision {
            namespace_id: self.entry_namespace(record),
            object_type: record.kind,
            record_id: record.uuid,
            command: Command::Update,
            snapshot: Some(snapshot),
        })?;
        Ok(true)
    }

    fn append_snapshotted(
        &self,
        log: &dyn RevisionRepository,
        record: &Record,
        command: Command,
    ) -> Result<bool, CaptureError> {
        let snapshot = match self.encode(record) {
            Some(snapshot) => snapshot,
            None => return Ok(false),
        };

        log.append(&NewRevision {
            namespace_id: self.entry_namespace(record),
            object_type: record.kind,
            record_id: record.uuid,
            command,
            snapshot: Some(snapshot),
        })?;
        Ok(true)
    }

    /// Encodes a snapshot, downgrading failures to a skipped record.
    ///
    /// Change tracking is best-effort relative to the primary write: the
    /// commit must not fail because one record would not encode.
    fn encode(&self, record: &Record) -> Option<Snapshot> {
        match self.encoder.encode(record) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn_encode_failure(record, &err);
                None
            }
        }
    }

    fn entry_namespace(&self, record: &Record) -> i64 {
        self.namespace_id.unwrap_or(record.namespace_id)
    }
}

fn warn_encode_failure(record: &Record, err: &SnapshotError) {
    warn!(
        "event=snapshot_encode_failed module=capture status=skip object_type={} record_id={} error={}",
        record.kind, record.uuid, err
    );
}
