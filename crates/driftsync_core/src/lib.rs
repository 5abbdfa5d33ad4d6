//! Core change-tracking logic for driftsync.
//!
//! Every mutation to a tracked record is captured at unit-of-work commit
//! time into an append-only revision log, which sync clients replay
//! through a resumable cursor-paginated delta feed.

pub mod capture;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod snapshot;

pub use capture::{classify, CaptureError, Origin, RevisionWriter, TouchedRecords};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::namespace::Namespace;
pub use model::record::{
    Attributes, Record, RecordId, RecordType, RecordValidationError,
};
pub use model::revision::{Command, NewRevision, RevisionEntry};
pub use repo::namespace_repo::{NamespaceRepository, SqliteNamespaceRepository};
pub use repo::record_repo::{
    RecordListQuery, RecordRepository, RepoError, RepoResult, SqliteRecordRepository,
};
pub use repo::revision_repo::{RevisionRepository, SqliteRevisionRepository};
pub use service::delta_service::{
    Delta, DeltaError, DeltaEvent, DeltaPage, DeltaService, START_CURSOR,
};
pub use session::{SessionError, SessionOptions, SessionResult, StoreSession};
pub use snapshot::{
    snapshot_delta, ApiSnapshotEncoder, Snapshot, SnapshotEncoder, SnapshotError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
