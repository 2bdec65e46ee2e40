use std::sync::Arc;

use elastci::shutdown::Shutdown;
use elastci::storage::{Database, StorageError, Value, ValueKind};
use tempfile::TempDir;

fn create_db(dir: &TempDir) -> Database {
    Database::create(dir.path().join("ci.db"), Shutdown::new()).unwrap()
}

#[test]
fn test_configuration_row_readback() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    let row = db
        .query(
            "SELECT http_port, http_threads FROM configuration",
            &[ValueKind::Int, ValueKind::Int],
            Vec::new(),
        )
        .unwrap();

    assert_eq!(row, vec![Value::Int(80), Value::Int(4)]);
}

#[test]
fn test_configuration_is_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    let result = db.query(
        "INSERT INTO configuration VALUES(?1, ?2)",
        &[],
        vec![Value::Int(8080), Value::Int(2)],
    );

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Only one row allowed"));
}

#[test]
fn test_typed_bind_and_readback() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    db.query(
        "INSERT INTO projects(name, enabled) VALUES(?1, ?2)",
        &[],
        vec![Value::from("web"), Value::from(true)],
    )
    .unwrap();

    let row = db
        .query(
            "SELECT name, enabled FROM projects WHERE name = ?1",
            &[ValueKind::Text, ValueKind::Bool],
            vec![Value::from("web")],
        )
        .unwrap();

    assert_eq!(row, vec![Value::from("web"), Value::Bool(true)]);
}

#[test]
fn test_statement_reuse_does_not_leak_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    // Same SQL text twice with different parameter sets exercises the
    // cached statement path.
    for (name, enabled) in [("alpha", true), ("beta", false)] {
        db.query(
            "INSERT INTO projects(name, enabled) VALUES(?1, ?2)",
            &[],
            vec![Value::from(name), Value::from(enabled)],
        )
        .unwrap();
    }

    for (name, enabled) in [("alpha", true), ("beta", false)] {
        let row = db
            .query(
                "SELECT name, enabled FROM projects WHERE name = ?1",
                &[ValueKind::Text, ValueKind::Bool],
                vec![Value::from(name)],
            )
            .unwrap();
        assert_eq!(row, vec![Value::from(name), Value::Bool(enabled)]);
    }
}

#[test]
fn test_empty_read_spec_yields_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    let result = db
        .query(
            "INSERT INTO projects(name, enabled) VALUES(?1, ?2)",
            &[],
            vec![Value::from("ops"), Value::from(true)],
        )
        .unwrap();

    assert!(result.is_empty());
}

#[test]
fn test_missing_row_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    let result = db.query(
        "SELECT name FROM projects WHERE id = ?1",
        &[ValueKind::Text],
        vec![Value::Int(999)],
    );

    let err = result.unwrap_err();
    assert!(matches!(err, StorageError::Sqlite(_)));
    assert!(err.to_string().contains("no rows"));
}

#[test]
fn test_wrong_parameter_count_is_a_typed_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    let result = db.query(
        "INSERT INTO projects(name, enabled) VALUES(?1, ?2)",
        &[],
        vec![Value::from("lonely")],
    );

    // The store's message survives to the caller instead of degrading to
    // a bare boolean.
    let err = result.unwrap_err();
    assert!(matches!(err, StorageError::Sqlite(_)));
}

#[test]
fn test_log_helpers_insert_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    db.log_system("unit test entry").unwrap();
    db.log_http("GET /unit").unwrap();

    let row = db
        .query(
            "SELECT contents FROM http_logs ORDER BY id DESC LIMIT 1",
            &[ValueKind::Text],
            Vec::new(),
        )
        .unwrap();
    assert_eq!(row, vec![Value::from("GET /unit")]);

    let row = db
        .query(
            "SELECT timestamp FROM system_logs ORDER BY id DESC LIMIT 1",
            &[ValueKind::Int],
            Vec::new(),
        )
        .unwrap();
    assert!(row[0].as_int().unwrap() > 0);
}

#[test]
fn test_single_thread_submissions_execute_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(&dir);

    for i in 0..5 {
        db.log_system(&format!("entry {i}")).unwrap();
    }

    let last = db
        .query(
            "SELECT contents FROM system_logs ORDER BY id DESC LIMIT 1",
            &[ValueKind::Text],
            Vec::new(),
        )
        .unwrap();
    assert_eq!(last, vec![Value::from("entry 4")]);

    // Row 1 is the creation log; the first submitted entry follows it.
    let first = db
        .query(
            "SELECT contents FROM system_logs ORDER BY id LIMIT 1 OFFSET 1",
            &[ValueKind::Text],
            Vec::new(),
        )
        .unwrap();
    assert_eq!(first, vec![Value::from("entry 0")]);
}

#[test]
fn test_concurrent_queries_each_execute_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(create_db(&dir));

    let threads: i64 = 8;
    let per_thread: i64 = 25;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    db.log_system(&format!("thread {t} entry {i}")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One creation log plus every submission, each committed exactly once.
    let count = db
        .query(
            "SELECT COUNT(*) FROM system_logs",
            &[ValueKind::Int],
            Vec::new(),
        )
        .unwrap();
    assert_eq!(count, vec![Value::Int(1 + threads * per_thread)]);
}

#[test]
fn test_query_after_close_fails_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = create_db(&dir);

    db.close();
    db.close(); // idempotent

    let err = db
        .query("SELECT 1", &[ValueKind::Int], Vec::new())
        .unwrap_err();
    assert!(matches!(err, StorageError::Stopped));
}

#[test]
fn test_cancelled_token_stops_accepting_queries() {
    let dir = tempfile::tempdir().unwrap();
    let token = Shutdown::new();
    let db = Database::create(dir.path().join("ci.db"), token.clone()).unwrap();

    token.cancel();

    let err = db
        .query("SELECT 1", &[ValueKind::Int], Vec::new())
        .unwrap_err();
    assert!(matches!(err, StorageError::Stopped));
}

#[test]
fn test_open_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    let result = Database::open(dir.path().join("absent.db"), Shutdown::new());
    assert!(result.is_err());
}

#[test]
fn test_reopen_preserves_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ci.db");

    {
        let db = Database::create(&path, Shutdown::new()).unwrap();
        db.log_system("before reopen").unwrap();
    }

    let db = Database::open(&path, Shutdown::new()).unwrap();
    let row = db
        .query(
            "SELECT contents FROM system_logs WHERE contents = ?1",
            &[ValueKind::Text],
            vec![Value::from("before reopen")],
        )
        .unwrap();
    assert_eq!(row, vec![Value::from("before reopen")]);
}
