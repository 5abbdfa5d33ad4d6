//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from capture/service orchestration.
//!
//! # Invariants
//! - Record writes must enforce `Record::validate()` before persistence.
//! - Read paths filter soft-deleted rows unless explicitly overridden.
//! - Revision persistence is append-only; no update or delete API exists.

pub mod namespace_repo;
pub mod record_repo;
pub mod revision_repo;
