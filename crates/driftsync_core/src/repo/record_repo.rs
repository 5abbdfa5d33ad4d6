//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `records` storage.
//! - Apply the soft-delete visibility filter on every read by default.
//!
//! # Invariants
//! - Write paths must call `Record::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - Removal is always a flag update; no physical delete path exists here.

use crate::db::DbError;
use crate::model::record::{Attributes, Record, RecordId, RecordType, RecordValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    uuid,
    namespace_id,
    type,
    attributes,
    is_deleted
FROM records";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound(RecordId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing records.
#[derive(Debug, Clone, Default)]
pub struct RecordListQuery {
    pub namespace_id: Option<i64>,
    pub kind: Option<RecordType>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for record CRUD operations.
///
/// Logical removal is expressed as `soft_delete_record`; the contract
/// deliberately has no physical delete so every removal stays observable
/// to revision capture.
pub trait RecordRepository {
    fn create_record(&self, record: &Record) -> RepoResult<RecordId>;
    fn update_record(&self, record: &Record) -> RepoResult<()>;
    fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<Record>>;
    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>>;
    fn soft_delete_record(&self, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn create_record(&self, record: &Record) -> RepoResult<RecordId> {
        record.validate()?;

        self.conn.execute(
            "INSERT INTO records (
                uuid,
                namespace_id,
                type,
                attributes,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                record.uuid.to_string(),
                record.namespace_id,
                record.kind.as_str(),
                encode_attributes(&record.attributes),
                bool_to_int(record.is_deleted),
            ],
        )?;

        Ok(record.uuid)
    }

    fn update_record(&self, record: &Record) -> RepoResult<()> {
        record.validate()?;

        // namespace_id is deliberately not updatable; records never move
        // between namespaces.
        let changed = self.conn.execute(
            "UPDATE records
             SET
                type = ?1,
                attributes = ?2,
                is_deleted = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?4;",
            params![
                record.kind.as_str(),
                encode_attributes(&record.attributes),
                bool_to_int(record.is_deleted),
                record.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(record.uuid));
        }

        Ok(())
    }

    fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }

        Ok(None)
    }

    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }

        if let Some(namespace_id) = query.namespace_id {
            sql.push_str(" AND namespace_id = ?");
            bind_values.push(Value::Integer(namespace_id));
        }

        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY updated_at DESC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn soft_delete_record(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<Record> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in records.uuid"))
    })?;

    let type_text: String = row.get("type")?;
    let kind = RecordType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid record type `{type_text}` in records.type"))
    })?;

    let attributes = parse_attributes(&row.get::<_, String>("attributes")?)?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in records.is_deleted"
            )));
        }
    };

    let record = Record {
        uuid,
        namespace_id: row.get("namespace_id")?,
        kind,
        attributes,
        is_deleted,
    };
    record.validate()?;
    Ok(record)
}

fn parse_attributes(value: &str) -> RepoResult<Attributes> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(RepoError::InvalidData(
            "records.attributes must hold a JSON object".to_string(),
        )),
        Err(err) => Err(RepoError::InvalidData(format!(
            "malformed JSON in records.attributes: {err}"
        ))),
    }
}

fn encode_attributes(attributes: &Attributes) -> String {
    serde_json::Value::Object(attributes.clone()).to_string()
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
