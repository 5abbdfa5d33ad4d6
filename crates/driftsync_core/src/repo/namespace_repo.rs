//! Namespace repository contracts and SQLite implementation.
//!
//! Namespaces only need create/lookup here; record and revision rows
//! reference them by id and cascade on namespace removal.

use crate::model::namespace::Namespace;
use crate::repo::record_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Repository interface for namespace rows.
pub trait NamespaceRepository {
    fn create_namespace(&self, name: &str) -> RepoResult<Namespace>;
    fn get_namespace(&self, id: i64) -> RepoResult<Option<Namespace>>;
}

/// SQLite-backed namespace repository.
pub struct SqliteNamespaceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNamespaceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NamespaceRepository for SqliteNamespaceRepository<'_> {
    fn create_namespace(&self, name: &str) -> RepoResult<Namespace> {
        let public_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO namespaces (public_id, name) VALUES (?1, ?2);",
            params![public_id, name],
        )?;

        Ok(Namespace {
            id: self.conn.last_insert_rowid(),
            public_id,
            name: name.to_string(),
        })
    }

    fn get_namespace(&self, id: i64) -> RepoResult<Option<Namespace>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, public_id, name
             FROM namespaces
             WHERE id = ?1;",
        )?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_namespace_row(row)?));
        }

        Ok(None)
    }
}

fn parse_namespace_row(row: &Row<'_>) -> RepoResult<Namespace> {
    Ok(Namespace {
        id: row.get("id")?,
        public_id: row.get("public_id")?,
        name: row.get("name")?,
    })
}
