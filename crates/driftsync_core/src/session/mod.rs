//! Unit-of-work session over the record store.
//!
//! # Responsibility
//! - Batch record creates/updates/soft-deletes inside one SQLite
//!   transaction and track every touched record.
//! - Run revision capture at commit time so entries land atomically with
//!   the records they describe.
//!
//! # Invariants
//! - Reads exclude soft-deleted records unless explicitly overridden.
//! - Deletion is always a soft-delete flag update routed through the
//!   normal write path; the session exposes no physical removal.
//! - Dropping a session without `commit()` rolls everything back and
//!   appends nothing.

use crate::capture::{CaptureError, RevisionWriter, TouchedRecords};
use crate::model::record::{Record, RecordId};
use crate::repo::record_repo::{
    RecordListQuery, RecordRepository, RepoError, SqliteRecordRepository,
};
use crate::repo::revision_repo::SqliteRevisionRepository;
use crate::snapshot::SnapshotEncoder;
use log::info;
use rusqlite::{Connection, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type SessionResult<T> = Result<T, SessionError>;

/// Failures surfaced by the unit-of-work write surface and commit path.
#[derive(Debug)]
pub enum SessionError {
    Repo(RepoError),
    Capture(CaptureError),
    /// Creating a record that is already tombstoned makes it invisible to
    /// every later read and can never be expressed in the change log.
    CreateDeleted(RecordId),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Capture(err) => write!(f, "{err}"),
            Self::CreateDeleted(id) => {
                write!(f, "refusing to create already-deleted record {id}")
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Capture(err) => Some(err),
            Self::CreateDeleted(_) => None,
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CaptureError> for SessionError {
    fn from(value: CaptureError) -> Self {
        Self::Capture(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Behavior switches for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Whether commits append to the change log. Bulk import paths that
    /// deliberately bypass the feed turn this off.
    pub versioned: bool,
    /// Ambient namespace scope: when set, every revision entry is stamped
    /// with this namespace id instead of reading each record's own.
    pub namespace_id: Option<i64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            versioned: true,
            namespace_id: None,
        }
    }
}

/// One transactional unit-of-work over the record store.
///
/// All writes go through this surface so the touched-record sets handed
/// to revision capture are complete.
pub struct StoreSession<'conn> {
    tx: Transaction<'conn>,
    options: SessionOptions,
    encoder: Arc<dyn SnapshotEncoder>,
    created: Vec<Record>,
    dirty: Vec<Record>,
}

impl<'conn> StoreSession<'conn> {
    /// Starts a unit-of-work on the given connection.
    pub fn begin(
        conn: &'conn mut Connection,
        options: SessionOptions,
        encoder: Arc<dyn SnapshotEncoder>,
    ) -> SessionResult<Self> {
        let tx = conn.transaction()?;
        Ok(Self {
            tx,
            options,
            encoder,
            created: Vec::new(),
            dirty: Vec::new(),
        })
    }

    /// Creates a record and tracks it as newly created.
    pub fn create(&mut self, record: &Record) -> SessionResult<RecordId> {
        if record.is_deleted {
            return Err(SessionError::CreateDeleted(record.uuid));
        }
        let repo = SqliteRecordRepository::new(&self.tx);
        repo.create_record(record)?;
        self.created.push(record.clone());
        Ok(record.uuid)
    }

    /// Updates a record in place and tracks it as dirty.
    ///
    /// Soft-deleted records are invisible to this path; a record's delete
    /// entry must stay its last, so updating one is `NotFound`.
    pub fn update(&mut self, record: &Record) -> SessionResult<()> {
        let repo = SqliteRecordRepository::new(&self.tx);
        if repo.get_record(record.uuid, false)?.is_none() {
            return Err(SessionError::Repo(RepoError::NotFound(record.uuid)));
        }
        repo.update_record(record)?;
        self.track_touched(record.clone());
        Ok(())
    }

    /// Soft-deletes a record by id and tracks the tombstoned state.
    pub fn delete(&mut self, id: RecordId) -> SessionResult<()> {
        let repo = SqliteRecordRepository::new(&self.tx);
        let mut record = match repo.get_record(id, false)? {
            Some(record) => record,
            None => return Err(SessionError::Repo(RepoError::NotFound(id))),
        };
        repo.soft_delete_record(id)?;
        record.soft_delete();
        self.track_touched(record);
        Ok(())
    }

    /// Reads one record with optional deleted-row visibility.
    pub fn get(&self, id: RecordId, include_deleted: bool) -> SessionResult<Option<Record>> {
        let repo = SqliteRecordRepository::new(&self.tx);
        Ok(repo.get_record(id, include_deleted)?)
    }

    /// Lists records using filter and pagination options.
    pub fn list(&self, query: &RecordListQuery) -> SessionResult<Vec<Record>> {
        let repo = SqliteRecordRepository::new(&self.tx);
        Ok(repo.list_records(query)?)
    }

    /// Runs revision capture over the touched sets, then commits.
    ///
    /// Returns the number of revision entries appended. Any capture store
    /// failure aborts before commit, rolling back data and log together.
    pub fn commit(self) -> SessionResult<usize> {
        let Self {
            tx,
            options,
            encoder,
            created,
            dirty,
        } = self;

        let mut appended = 0;
        if options.versioned {
            let writer = RevisionWriter::new(options.namespace_id, encoder.as_ref());
            let log = SqliteRevisionRepository::new(&tx);
            appended = writer.create_revisions(
                &log,
                &TouchedRecords {
                    created: &created,
                    dirty: &dirty,
                    removed: &[],
                },
            )?;
        }
        tx.commit()?;

        info!(
            "event=session_commit module=session status=ok created={} dirty={} revisions={}",
            created.len(),
            dirty.len(),
            appended
        );
        Ok(appended)
    }

    /// Discards every pending write without appending any entry.
    pub fn rollback(self) -> SessionResult<()> {
        let Self { tx, .. } = self;
        tx.rollback()?;
        Ok(())
    }

    /// Folds repeated writes to one record into a single touched entry,
    /// keeping its final state for capture.
    fn track_touched(&mut self, record: Record) {
        if let Some(existing) = self
            .created
            .iter_mut()
            .find(|candidate| candidate.uuid == record.uuid)
        {
            *existing = record;
            return;
        }
        if let Some(existing) = self
            .dirty
            .iter_mut()
            .find(|candidate| candidate.uuid == record.uuid)
        {
            *existing = record;
            return;
        }
        self.dirty.push(record);
    }
}
