use driftsync_core::db::open_db_in_memory;
use driftsync_core::{
    Namespace, NamespaceRepository, Record, RecordListQuery, RecordRepository, RecordType,
    RepoError, SqliteNamespaceRepository, SqliteRecordRepository,
};
use rusqlite::Connection;
use serde_json::json;

#[test]
fn create_and_get_roundtrip_preserves_attributes() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let mut record = Record::new(namespace.id, RecordType::Message);
    record.attributes.insert("subject".to_string(), json!("hi"));
    let id = repo.create_record(&record).unwrap();

    let loaded = repo.get_record(id, false).unwrap().unwrap();
    assert_eq!(loaded.uuid, record.uuid);
    assert_eq!(loaded.namespace_id, namespace.id);
    assert_eq!(loaded.kind, RecordType::Message);
    assert_eq!(loaded.attributes.get("subject"), Some(&json!("hi")));
    assert!(!loaded.is_deleted);
}

#[test]
fn update_existing_record_replaces_attributes() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let mut record = Record::new(namespace.id, RecordType::Contact);
    record.attributes.insert("name".to_string(), json!("Ada"));
    repo.create_record(&record).unwrap();

    record
        .attributes
        .insert("name".to_string(), json!("Ada Lovelace"));
    record.attributes.insert("phone".to_string(), json!("555"));
    repo.update_record(&record).unwrap();

    let loaded = repo.get_record(record.uuid, false).unwrap().unwrap();
    assert_eq!(loaded.attributes.get("name"), Some(&json!("Ada Lovelace")));
    assert_eq!(loaded.attributes.get("phone"), Some(&json!("555")));
}

#[test]
fn update_not_found_returns_not_found() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let record = Record::new(namespace.id, RecordType::Thread);
    let err = repo.update_record(&record).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == record.uuid));
}

#[test]
fn list_excludes_deleted_by_default_and_can_include_them() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let record_a = Record::new(namespace.id, RecordType::Message);
    let record_b = Record::new(namespace.id, RecordType::Thread);
    repo.create_record(&record_a).unwrap();
    repo.create_record(&record_b).unwrap();
    repo.soft_delete_record(record_b.uuid).unwrap();

    let visible = repo.list_records(&RecordListQuery::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].uuid, record_a.uuid);

    let include_deleted = RecordListQuery {
        include_deleted: true,
        ..RecordListQuery::default()
    };
    let all = repo.list_records(&include_deleted).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn get_excludes_deleted_unless_overridden() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let record = Record::new(namespace.id, RecordType::Contact);
    repo.create_record(&record).unwrap();
    repo.soft_delete_record(record.uuid).unwrap();

    assert!(repo.get_record(record.uuid, false).unwrap().is_none());
    let tombstoned = repo.get_record(record.uuid, true).unwrap().unwrap();
    assert!(tombstoned.is_deleted);
}

#[test]
fn soft_delete_is_idempotent() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let record = Record::new(namespace.id, RecordType::Message);
    repo.create_record(&record).unwrap();

    repo.soft_delete_record(record.uuid).unwrap();
    repo.soft_delete_record(record.uuid).unwrap();

    assert!(repo.get_record(record.uuid, false).unwrap().is_none());
}

#[test]
fn validation_failure_blocks_create_and_update() {
    let (conn, namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let mut invalid = Record::new(namespace.id, RecordType::Message);
    invalid.attributes.insert("id".to_string(), json!("shadow"));

    let create_err = repo.create_record(&invalid).unwrap_err();
    assert!(matches!(create_err, RepoError::Validation(_)));

    let mut valid = Record::new(namespace.id, RecordType::Message);
    repo.create_record(&valid).unwrap();

    valid.attributes.insert("object".to_string(), json!("x"));
    let update_err = repo.update_record(&valid).unwrap_err();
    assert!(matches!(update_err, RepoError::Validation(_)));
}

#[test]
fn list_filters_by_type_and_namespace() {
    let (conn, namespace) = setup();
    let other = SqliteNamespaceRepository::new(&conn)
        .create_namespace("other")
        .unwrap();
    let repo = SqliteRecordRepository::new(&conn);

    let message = Record::new(namespace.id, RecordType::Message);
    let thread = Record::new(namespace.id, RecordType::Thread);
    let foreign = Record::new(other.id, RecordType::Message);
    repo.create_record(&message).unwrap();
    repo.create_record(&thread).unwrap();
    repo.create_record(&foreign).unwrap();

    let query = RecordListQuery {
        namespace_id: Some(namespace.id),
        kind: Some(RecordType::Message),
        include_deleted: true,
        ..RecordListQuery::default()
    };

    let result = repo.list_records(&query).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].uuid, message.uuid);
}

#[test]
fn create_with_unknown_namespace_fails_on_foreign_key() {
    let (conn, _namespace) = setup();
    let repo = SqliteRecordRepository::new(&conn);

    let orphan = Record::new(9999, RecordType::Message);
    let err = repo.create_record(&orphan).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

fn setup() -> (Connection, Namespace) {
    let conn = open_db_in_memory().unwrap();
    let namespace = SqliteNamespaceRepository::new(&conn)
        .create_namespace("primary")
        .unwrap();
    (conn, namespace)
}
