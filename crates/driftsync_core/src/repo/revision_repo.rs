//! Change-log repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append revision entries with store-assigned sequence ids.
//! - Serve the ordered range scans and lookups behind cursor pagination
//!   and update diffing.
//!
//! # Invariants
//! - The log is append-only: this contract exposes no update or delete.
//! - Sequence ids come from rowid autoincrement, so ascending id order
//!   matches append order.
//! - `public_id` is generated once at append time and never changes.

use crate::model::record::{RecordId, RecordType};
use crate::model::revision::{Command, NewRevision, RevisionEntry};
use crate::repo::record_repo::{RepoError, RepoResult};
use crate::snapshot::Snapshot;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const REVISION_SELECT_SQL: &str = "SELECT
    id,
    public_id,
    namespace_id,
    object_type,
    record_id,
    command,
    snapshot,
    created_at
FROM revisions";

/// Repository interface for the append-only revision log.
pub trait RevisionRepository {
    /// Appends one entry and returns it with its store-assigned identity.
    fn append(&self, revision: &NewRevision) -> RepoResult<RevisionEntry>;
    /// Returns up to `limit` entries with sequence id greater than
    /// `after_id`, ascending, scoped to one namespace.
    fn entries_after(
        &self,
        namespace_id: i64,
        after_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<RevisionEntry>>;
    /// Resolves a cursor public id within one namespace.
    fn find_by_public_id(
        &self,
        namespace_id: i64,
        public_id: &str,
    ) -> RepoResult<Option<RevisionEntry>>;
    /// Returns the most recent entry for one record, if any.
    fn last_for_record(
        &self,
        object_type: RecordType,
        record_id: RecordId,
    ) -> RepoResult<Option<RevisionEntry>>;
    /// Returns the most recent entry appended strictly before
    /// `timestamp_ms`, scoped to one namespace.
    fn last_before(
        &self,
        namespace_id: i64,
        timestamp_ms: i64,
    ) -> RepoResult<Option<RevisionEntry>>;
}

/// SQLite-backed revision log repository.
pub struct SqliteRevisionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRevisionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RevisionRepository for SqliteRevisionRepository<'_> {
    fn append(&self, revision: &NewRevision) -> RepoResult<RevisionEntry> {
        check_snapshot_presence(revision.command, revision.snapshot.is_some())?;

        let public_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO revisions (
                public_id,
                namespace_id,
                object_type,
                record_id,
                command,
                snapshot
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                public_id,
                revision.namespace_id,
                revision.object_type.as_str(),
                revision.record_id.to_string(),
                revision.command.as_str(),
                revision.snapshot.as_ref().map(encode_snapshot),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let mut stmt = self
            .conn
            .prepare(&format!("{REVISION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_revision_row(row),
            None => Err(RepoError::InvalidData(format!(
                "revision {id} not readable after append"
            ))),
        }
    }

    fn entries_after(
        &self,
        namespace_id: i64,
        after_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<RevisionEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             WHERE namespace_id = ?1
               AND id > ?2
             ORDER BY id ASC
             LIMIT ?3;"
        ))?;

        let mut rows = stmt.query(params![namespace_id, after_id, limit])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_revision_row(row)?);
        }

        Ok(entries)
    }

    fn find_by_public_id(
        &self,
        namespace_id: i64,
        public_id: &str,
    ) -> RepoResult<Option<RevisionEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             WHERE public_id = ?1
               AND namespace_id = ?2;"
        ))?;

        let mut rows = stmt.query(params![public_id, namespace_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_revision_row(row)?));
        }

        Ok(None)
    }

    fn last_for_record(
        &self,
        object_type: RecordType,
        record_id: RecordId,
    ) -> RepoResult<Option<RevisionEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             WHERE object_type = ?1
               AND record_id = ?2
             ORDER BY id DESC
             LIMIT 1;"
        ))?;

        let mut rows = stmt.query(params![object_type.as_str(), record_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_revision_row(row)?));
        }

        Ok(None)
    }

    fn last_before(
        &self,
        namespace_id: i64,
        timestamp_ms: i64,
    ) -> RepoResult<Option<RevisionEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             WHERE namespace_id = ?1
               AND created_at < ?2
             ORDER BY id DESC
             LIMIT 1;"
        ))?;

        let mut rows = stmt.query(params![namespace_id, timestamp_ms])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_revision_row(row)?));
        }

        Ok(None)
    }
}

fn check_snapshot_presence(command: Command, has_snapshot: bool) -> RepoResult<()> {
    let valid = match command {
        Command::Insert | Command::Update => has_snapshot,
        Command::Delete => !has_snapshot,
    };
    if valid {
        Ok(())
    } else {
        Err(RepoError::InvalidData(format!(
            "revision command `{command}` with snapshot={has_snapshot} violates the log contract"
        )))
    }
}

fn parse_revision_row(row: &Row<'_>) -> RepoResult<RevisionEntry> {
    let record_id_text: String = row.get("record_id")?;
    let record_id = Uuid::parse_str(&record_id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{record_id_text}` in revisions.record_id"
        ))
    })?;

    let type_text: String = row.get("object_type")?;
    let object_type = RecordType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid record type `{type_text}` in revisions.object_type"
        ))
    })?;

    let command_text: String = row.get("command")?;
    let command = Command::parse(&command_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid command `{command_text}` in revisions.command"
        ))
    })?;

    let snapshot = match row.get::<_, Option<String>>("snapshot")? {
        Some(text) => Some(parse_snapshot(&text)?),
        None => None,
    };
    check_snapshot_presence(command, snapshot.is_some())?;

    Ok(RevisionEntry {
        id: row.get("id")?,
        public_id: row.get("public_id")?,
        namespace_id: row.get("namespace_id")?,
        object_type,
        record_id,
        command,
        snapshot,
        created_at: row.get("created_at")?,
    })
}

fn parse_snapshot(value: &str) -> RepoResult<Snapshot> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(RepoError::InvalidData(
            "revisions.snapshot must hold a JSON object".to_string(),
        )),
        Err(err) => Err(RepoError::InvalidData(format!(
            "malformed JSON in revisions.snapshot: {err}"
        ))),
    }
}

fn encode_snapshot(snapshot: &Snapshot) -> String {
    serde_json::Value::Object(snapshot.clone()).to_string()
}
