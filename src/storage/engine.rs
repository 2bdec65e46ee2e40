use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use tracing::debug;

use crate::shutdown::Shutdown;
use crate::storage::value::{Value, ValueKind, column_value};

/// Bounded retry for a temporarily busy store.
const BUSY_RETRIES: u32 = 8;
const BUSY_BACKOFF: Duration = Duration::from_millis(1);

/// Prepared statements cached by SQL text on the executor's connection.
const STATEMENT_CACHE_CAPACITY: usize = 32;

const SCHEMA: &str = "
BEGIN TRANSACTION;

CREATE TABLE configuration(
  http_port                     INTEGER NOT NULL,
  http_threads                  INTEGER NOT NULL
);

CREATE TABLE users(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  username                      VARCHAR(32) NOT NULL UNIQUE,
  email                         VARCHAR(320) NOT NULL UNIQUE,
  pw_version                    INTEGER NOT NULL,
  pw_salt                       VARCHAR(32) NOT NULL UNIQUE,
  pw_hash                       TEXT NOT NULL
);

CREATE TABLE projects(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  name                          TEXT NOT NULL UNIQUE,
  enabled                       BOOLEAN NOT NULL
);

CREATE TABLE users_projects(
  user_id                       INTEGER NOT NULL,
  project_id                    INTEGER NOT NULL,

  PRIMARY KEY(user_id, project_id),

  FOREIGN KEY(user_id)          REFERENCES users(id),
  FOREIGN KEY(project_id)       REFERENCES projects(id)
);

CREATE TABLE configurations(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  name                          VARCHAR(128) NOT NULL UNIQUE,
  project_id                    INTEGER NOT NULL,

  FOREIGN KEY(project_id)       REFERENCES projects(id)
);

CREATE TABLE projects_configuration(
  project_id                    INTEGER NOT NULL,
  configuration_id              INTEGER NOT NULL,

  PRIMARY KEY(project_id, configuration_id),

  FOREIGN KEY(project_id)       REFERENCES projects(id),
  FOREIGN KEY(configuration_id) REFERENCES configurations(id)
);

CREATE TABLE builds(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  project_id                    INTEGER NOT NULL,
  status                        INTEGER NOT NULL,
  start_timestamp               INTEGER NOT NULL,
  end_timestamp                 INTEGER,

  FOREIGN KEY(project_id)       REFERENCES projects(id)
);

CREATE TABLE build_logs(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  project_id                    INTEGER NOT NULL,
  build_id                      INTEGER NOT NULL,
  configuration_id              INTEGER NOT NULL,
  contents                      TEXT NOT NULL,

  FOREIGN KEY(project_id)       REFERENCES projects(id),
  FOREIGN KEY(build_id)         REFERENCES builds(id),
  FOREIGN KEY(configuration_id) REFERENCES configurations(id)
);

CREATE TABLE system_logs(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  timestamp                     INTEGER NOT NULL,
  contents                      TEXT NOT NULL
);

CREATE TABLE http_logs(
  id                            INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  timestamp                     INTEGER NOT NULL,
  contents                      TEXT NOT NULL
);

INSERT INTO configuration VALUES(80, 4);

CREATE TRIGGER configuration_prevent_insertion
  BEFORE INSERT ON configuration WHEN(SELECT COUNT(*) FROM configuration) >= 1
BEGIN
  SELECT RAISE(FAIL, 'Only one row allowed for configuration');
END;

COMMIT;
";

/// Storage failure surfaced to [`Database::query`] callers.
///
/// The underlying store message is preserved rather than flattened into a
/// boolean outcome.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage contended after {attempts} attempts")]
    Contended { attempts: u32 },
    #[error("storage engine is stopped")]
    Stopped,
    #[error("failed to start storage executor: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One deferred store operation awaiting the executor thread.
///
/// Executes on the executor thread only, exactly once, in enqueue order.
struct Task {
    sql: String,
    params: Vec<Value>,
    columns: Vec<ValueKind>,
    result: mpsc::Sender<Result<Vec<Value>, StorageError>>,
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    available: Condvar,
    running: AtomicBool,
    shutdown: Shutdown,
}

impl Shared {
    fn stopping(&self) -> bool {
        !self.running.load(Ordering::SeqCst) || self.shutdown.is_cancelled()
    }
}

/// The async storage engine.
///
/// Owns the relational store through a single executor thread: every
/// operation is enqueued as a [`Task`] and executed there, and [`query`]
/// blocks the calling thread until its task completes. Callable from any
/// thread.
///
/// [`query`]: Database::query
pub struct Database {
    shared: Arc<Shared>,
    executor: Option<JoinHandle<()>>,
}

impl Database {
    /// Opens an existing store. Fails when the file does not exist.
    pub fn open(path: impl AsRef<Path>, shutdown: Shutdown) -> Result<Self, StorageError> {
        let conn = Connection::open_with_flags(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        let db = Self::start(conn, shutdown)?;
        db.log_system("Opened database (Existing)")?;
        Ok(db)
    }

    /// Creates a new store with the full schema installed.
    pub fn create(path: impl AsRef<Path>, shutdown: Shutdown) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        let db = Self::start(conn, shutdown)?;
        db.log_system("Opened database (Created)")?;
        Ok(db)
    }

    fn start(conn: Connection, shutdown: Shutdown) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            running: AtomicBool::new(true),
            shutdown,
        });

        let executor = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("storage".into())
                .spawn(move || executor_loop(conn, &shared))?
        };

        Ok(Self {
            shared,
            executor: Some(executor),
        })
    }

    /// Runs `sql` on the executor thread, binding `params` in order and
    /// reading one row back per `columns`. An empty `columns` means a
    /// non-row-returning statement executed to completion, yielding an
    /// empty sequence. Blocks until the executor fulfills the result slot;
    /// when the engine is stopping the call fails with
    /// [`StorageError::Stopped`] instead of blocking forever.
    pub fn query(
        &self,
        sql: impl Into<String>,
        columns: &[ValueKind],
        params: Vec<Value>,
    ) -> Result<Vec<Value>, StorageError> {
        if self.shared.stopping() {
            return Err(StorageError::Stopped);
        }

        let (result, slot) = mpsc::channel();
        let task = Task {
            sql: sql.into(),
            params,
            columns: columns.to_vec(),
            result,
        };

        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.push_back(task);
        }
        self.shared.available.notify_one();

        // A task dropped unexecuted also drops its sender, failing the
        // recv instead of leaving the caller parked forever.
        slot.recv().map_err(|_| StorageError::Stopped)?
    }

    /// Appends `contents` with the current Unix timestamp to `system_logs`.
    pub fn log_system(&self, contents: &str) -> Result<(), StorageError> {
        self.log("system_logs", contents)
    }

    /// Appends `contents` with the current Unix timestamp to `http_logs`.
    pub fn log_http(&self, contents: &str) -> Result<(), StorageError> {
        self.log("http_logs", contents)
    }

    fn log(&self, table: &str, contents: &str) -> Result<(), StorageError> {
        let timestamp = Utc::now().timestamp();
        self.query(
            format!("INSERT INTO {table}(timestamp, contents) VALUES(?1, ?2)"),
            &[],
            vec![Value::Int(timestamp), Value::from(contents)],
        )?;
        Ok(())
    }

    /// Stops the engine. Tasks already queued are drained by the executor;
    /// tasks submitted from here on fail with [`StorageError::Stopped`].
    /// The cached statements and the store handle are released on the
    /// executor thread before this returns. Idempotent.
    pub fn close(&mut self) {
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.log_system("Closed database") {
            debug!(error = %e, "Failed to record database close");
        }

        self.shared.running.store(false, Ordering::SeqCst);
        {
            let _queue = self.shared.queue.lock().unwrap();
            self.shared.available.notify_one();
        }

        if let Some(executor) = self.executor.take() {
            let _ = executor.join();
        }

        // Anything that slipped in after the flag flipped never ran; drop
        // the tasks so their callers unblock with Stopped.
        self.shared.queue.lock().unwrap().clear();
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

fn executor_loop(conn: Connection, shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                if shared.stopping() {
                    // The connection and its statement cache drop here, on
                    // the executor thread, before the join returns.
                    return;
                }
                queue = shared.available.wait(queue).unwrap();
            }
        };

        let result = run_task(&conn, &task);
        if let Err(e) = &result {
            debug!(sql = %task.sql, error = %e, "Storage task failed");
        }
        // The caller may have given up; a dead slot is not an error here.
        let _ = task.result.send(result);
    }
}

/// Runs one task, retrying a bounded number of times with doubling backoff
/// while the store reports itself busy.
fn run_task(conn: &Connection, task: &Task) -> Result<Vec<Value>, StorageError> {
    let mut delay = BUSY_BACKOFF;
    let mut attempts = 0;

    loop {
        match execute(conn, task) {
            Err(StorageError::Sqlite(e)) if is_busy(&e) => {
                attempts += 1;
                if attempts >= BUSY_RETRIES {
                    return Err(StorageError::Contended { attempts });
                }
                std::thread::sleep(delay);
                delay *= 2;
            }
            result => return result,
        }
    }
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

fn execute(conn: &Connection, task: &Task) -> Result<Vec<Value>, StorageError> {
    // prepare_cached reuses the statement compiled for this SQL text. The
    // cache resets a statement and clears its bindings on reuse, and
    // recompiles entries that fail to reset.
    let mut statement = conn.prepare_cached(&task.sql)?;

    if task.columns.is_empty() {
        statement.execute(params_from_iter(task.params.iter()))?;
        return Ok(Vec::new());
    }

    let mut rows = statement.query(params_from_iter(task.params.iter()))?;
    let row = match rows.next()? {
        Some(row) => row,
        None => return Err(StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
    };

    task.columns
        .iter()
        .enumerate()
        .map(|(index, kind)| column_value(row, index, *kind).map_err(StorageError::from))
        .collect()
}
