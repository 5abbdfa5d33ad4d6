use driftsync_core::db::open_db_in_memory;
use driftsync_core::{
    ApiSnapshotEncoder, DeltaError, DeltaEvent, DeltaService, Namespace, NamespaceRepository,
    Record, RecordType, SessionOptions, SqliteNamespaceRepository, SqliteRevisionRepository,
    StoreSession, START_CURSOR,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;

#[test]
fn message_create_is_served_as_single_create_delta() {
    let (mut conn, namespace) = setup();

    let mut message = Record::new(namespace.id, RecordType::Message);
    message
        .attributes
        .insert("to".to_string(), json!([{"email": "one@example.com"}]));
    message
        .attributes
        .insert("cc".to_string(), json!([{"email": "two@example.com"}]));

    let mut session = begin(&mut conn, SessionOptions::default());
    session.create(&message).unwrap();
    session.commit().unwrap();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));
    let page = service.page(namespace.id, START_CURSOR, Some(10)).unwrap();

    assert_eq!(page.cursor_start, START_CURSOR);
    assert_eq!(page.deltas.len(), 1);
    let delta = &page.deltas[0];
    assert_eq!(delta.id, message.uuid.to_string());
    assert_eq!(delta.object_type, RecordType::Message);
    assert_eq!(delta.event, DeltaEvent::Create);

    let attributes = delta.attributes.as_ref().unwrap();
    assert_eq!(attributes.get("object"), Some(&json!("message")));
    assert_eq!(
        attributes.get("to"),
        Some(&json!([{"email": "one@example.com"}]))
    );
    assert_eq!(
        attributes.get("cc"),
        Some(&json!([{"email": "two@example.com"}]))
    );
    assert_ne!(page.cursor_end, START_CURSOR);
}

#[test]
fn unknown_cursor_raises_invalid_cursor_error() {
    let (mut conn, namespace) = setup();

    let record = Record::new(namespace.id, RecordType::Message);
    let mut session = begin(&mut conn, SessionOptions::default());
    session.create(&record).unwrap();
    session.commit().unwrap();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));
    let err = service
        .page(namespace.id, "no-such-cursor", Some(10))
        .unwrap_err();
    assert!(matches!(err, DeltaError::InvalidCursor(cursor) if cursor == "no-such-cursor"));
}

#[test]
fn empty_log_page_reports_caller_caught_up() {
    let (conn, namespace) = setup();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));
    let page = service.page(namespace.id, START_CURSOR, None).unwrap();

    assert!(page.deltas.is_empty());
    assert_eq!(page.cursor_end, START_CURSOR);
}

#[test]
fn successive_pages_are_gap_free_and_duplicate_free() {
    let (mut conn, namespace) = setup();

    let mut expected_ids = Vec::new();
    for index in 0..5 {
        let mut record = Record::new(namespace.id, RecordType::Contact);
        record
            .attributes
            .insert("name".to_string(), json!(format!("contact-{index}")));
        let mut session = begin(&mut conn, SessionOptions::default());
        session.create(&record).unwrap();
        session.commit().unwrap();
        expected_ids.push(record.uuid.to_string());
    }

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));

    let unbounded = service.page(namespace.id, START_CURSOR, Some(500)).unwrap();
    let unbounded_ids: Vec<_> = unbounded
        .deltas
        .iter()
        .map(|delta| delta.id.clone())
        .collect();
    assert_eq!(unbounded_ids, expected_ids);

    let mut collected_ids = Vec::new();
    let mut cursor = START_CURSOR.to_string();
    loop {
        let page = service.page(namespace.id, &cursor, Some(2)).unwrap();
        if page.deltas.is_empty() {
            assert_eq!(page.cursor_end, cursor);
            break;
        }
        collected_ids.extend(page.deltas.iter().map(|delta| delta.id.clone()));
        cursor = page.cursor_end;
    }
    assert_eq!(collected_ids, expected_ids);
}

#[test]
fn cursor_for_timestamp_skips_entries_before_that_time() {
    let (mut conn, namespace) = setup();

    let mut record_ids = Vec::new();
    for _ in 0..3 {
        let record = Record::new(namespace.id, RecordType::Thread);
        let mut session = begin(&mut conn, SessionOptions::default());
        session.create(&record).unwrap();
        session.commit().unwrap();
        record_ids.push(record.uuid.to_string());
    }

    // Pin append times so the wall-clock lookup is deterministic.
    conn.execute("UPDATE revisions SET created_at = 1000 WHERE id = 1;", [])
        .unwrap();
    conn.execute("UPDATE revisions SET created_at = 2500 WHERE id = 2;", [])
        .unwrap();
    conn.execute("UPDATE revisions SET created_at = 3500 WHERE id = 3;", [])
        .unwrap();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));

    let cursor = service.cursor_for_timestamp(namespace.id, 2).unwrap();
    assert_ne!(cursor, START_CURSOR);

    let page = service.page(namespace.id, &cursor, Some(10)).unwrap();
    let ids: Vec<_> = page.deltas.iter().map(|delta| delta.id.clone()).collect();
    assert_eq!(ids, record_ids[1..].to_vec());
}

#[test]
fn cursor_for_timestamp_before_any_entry_returns_start_sentinel() {
    let (conn, namespace) = setup();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));
    let cursor = service.cursor_for_timestamp(namespace.id, 12345).unwrap();
    assert_eq!(cursor, START_CURSOR);
}

#[test]
fn delete_delta_omits_attributes_in_wire_shape() {
    let (mut conn, namespace) = setup();

    let record = Record::new(namespace.id, RecordType::Contact);
    let mut session = begin(&mut conn, SessionOptions::default());
    session.create(&record).unwrap();
    session.commit().unwrap();

    let mut session = begin(&mut conn, SessionOptions::default());
    session.delete(record.uuid).unwrap();
    session.commit().unwrap();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));
    let page = service.page(namespace.id, START_CURSOR, None).unwrap();
    assert_eq!(page.deltas.len(), 2);

    let wire = serde_json::to_value(&page).unwrap();
    let deltas = wire.get("deltas").and_then(|value| value.as_array()).unwrap();

    assert_eq!(deltas[0].get("event"), Some(&json!("create")));
    assert!(deltas[0].get("attributes").is_some());

    assert_eq!(deltas[1].get("event"), Some(&json!("delete")));
    assert_eq!(deltas[1].get("id"), Some(&json!(record.uuid.to_string())));
    assert_eq!(deltas[1].get("object_type"), Some(&json!("contact")));
    assert!(deltas[1].get("attributes").is_none());
}

#[test]
fn cursors_do_not_resolve_across_namespaces() {
    let (mut conn, namespace) = setup();
    let other = SqliteNamespaceRepository::new(&conn)
        .create_namespace("other")
        .unwrap();

    let record = Record::new(namespace.id, RecordType::Message);
    let mut session = begin(&mut conn, SessionOptions::default());
    session.create(&record).unwrap();
    session.commit().unwrap();

    let service = DeltaService::new(SqliteRevisionRepository::new(&conn));
    let page = service.page(namespace.id, START_CURSOR, None).unwrap();
    let foreign_cursor = page.cursor_end;

    let err = service.page(other.id, &foreign_cursor, None).unwrap_err();
    assert!(matches!(err, DeltaError::InvalidCursor(_)));

    let empty = service.page(other.id, START_CURSOR, None).unwrap();
    assert!(empty.deltas.is_empty());
}

fn setup() -> (Connection, Namespace) {
    let conn = open_db_in_memory().unwrap();
    let namespace = SqliteNamespaceRepository::new(&conn)
        .create_namespace("primary")
        .unwrap();
    (conn, namespace)
}

fn begin<'conn>(
    conn: &'conn mut Connection,
    options: SessionOptions,
) -> StoreSession<'conn> {
    StoreSession::begin(conn, options, Arc::new(ApiSnapshotEncoder::new())).unwrap()
}
