use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::{oneshot, watch};

use super::migrations::{run_migrations, MigrationOutcome, MigrationPolicy};

type StoreJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerMessage {
    Run(StoreJob),
    Stop,
}

/// Where the history lives.
#[derive(Debug, Clone)]
enum StoreLocation {
    File(PathBuf),
    Memory,
}

impl StoreLocation {
    fn display_path(&self) -> PathBuf {
        match self {
            StoreLocation::File(path) => path.clone(),
            StoreLocation::Memory => PathBuf::from(":memory:"),
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        match self {
            StoreLocation::File(path) => {
                let conn = Connection::open(path)?;
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                Ok(conn)
            }
            StoreLocation::Memory => Connection::open_in_memory(),
        }
    }
}

struct StoreWorker {
    jobs: mpsc::Sender<WorkerMessage>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(handle) = handle {
            if let Err(err) = self.jobs.send(WorkerMessage::Stop) {
                error!("Failed to stop sleeptracker-db thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("sleeptracker-db thread panicked: {join_err:?}");
            }
        }
    }
}

/// Process-wide handle returned by [`Database::shared`].
static SHARED: Mutex<Option<Database>> = Mutex::new(None);

/// Handle to the sleep history store.
///
/// The SQLite connection lives on a dedicated worker thread; every query is
/// shipped there as a closure so callers on the async runtime never block on
/// disk I/O. Clones share the same connection and the same change feed.
#[derive(Clone)]
pub struct Database {
    worker: Arc<StoreWorker>,
    revision: Arc<watch::Sender<u64>>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::with_policy(db_path, MigrationPolicy::default())
    }

    pub fn with_policy(db_path: PathBuf, policy: MigrationPolicy) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let database = Self::start(StoreLocation::File(db_path), policy)?;
        info!("Database initialized at {}", database.path().display());
        Ok(database)
    }

    /// Opens a private in-memory store with the current schema.
    pub fn open_in_memory() -> Result<Self> {
        Self::start(StoreLocation::Memory, MigrationPolicy::default())
    }

    /// Returns the process-wide database, opening it on first use.
    ///
    /// Concurrent first calls are serialized: exactly one connection is
    /// opened and every caller receives a clone of it. Arguments of later
    /// calls are ignored once the handle exists.
    pub fn shared(db_path: PathBuf, policy: MigrationPolicy) -> Result<Self> {
        let mut guard = match SHARED.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }

        let database = Self::with_policy(db_path, policy)?;
        *guard = Some(database.clone());
        Ok(database)
    }

    fn start(location: StoreLocation, policy: MigrationPolicy) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<WorkerMessage>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let db_path = location.display_path();

        let thread = thread::Builder::new()
            .name("sleeptracker-db".into())
            .spawn(move || {
                let mut conn = match prepare_store(&location, policy) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(WorkerMessage::Run(job)) = jobs_rx.recv() {
                    job(&mut conn);
                }

                info!("Database thread shutting down");
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        let (revision, _) = watch::channel(0);
        Ok(Self {
            worker: Arc::new(StoreWorker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            revision: Arc::new(revision),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Counter bumped after every write to the nights table.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver whose value changes after every write to the nights table.
    pub fn watch_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub(crate) fn mark_changed(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: StoreJob = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("DB caller dropped before receiving result");
            }
        });

        self.worker
            .jobs
            .send(WorkerMessage::Run(job))
            .map_err(|err| anyhow!("failed to send job to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

fn prepare_store(location: &StoreLocation, policy: MigrationPolicy) -> Result<Connection> {
    let mut conn = location
        .connect()
        .context("failed to open SQLite database")?;

    let outcome = run_migrations(&mut conn, policy).context("failed to run database migrations")?;
    if let MigrationOutcome::Recreated { from_version } = outcome {
        warn!("Schema version {from_version} had no upgrade path; sleep history was discarded");
    }
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_execute_runs_on_worker_thread() {
        // Arrange
        let database = Database::open_in_memory().expect("failed to open in-memory db");

        // Act
        let thread_name = database
            .execute(|_conn| Ok(thread::current().name().map(str::to_string)))
            .await
            .expect("failed to execute task");

        // Assert
        assert_eq!(thread_name.as_deref(), Some("sleeptracker-db"));
    }

    #[tokio::test]
    async fn test_execute_propagates_task_errors() {
        // Arrange
        let database = Database::open_in_memory().expect("failed to open in-memory db");

        // Act
        let result: Result<()> = database
            .execute(|conn| {
                conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
                Ok(())
            })
            .await;

        // Assert
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_change_feed() {
        // Arrange
        let database = Database::open_in_memory().expect("failed to open in-memory db");
        let mut changes = database.clone().watch_changes();

        // Act
        database.mark_changed();

        // Assert
        assert!(changes.has_changed().expect("change feed closed"));
        assert_eq!(*changes.borrow_and_update(), 1);
    }

    #[test]
    fn test_new_creates_parent_directory() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        let db_path = dir.path().join("nested").join("sleep.sqlite3");

        // Act
        let database = Database::new(db_path.clone()).expect("failed to open db");

        // Assert
        assert_eq!(database.path(), db_path.as_path());
        assert!(db_path.exists());
    }

    #[test]
    fn test_shared_hands_out_one_connection_under_concurrent_first_call() {
        // Arrange
        let dir = tempdir().expect("failed to create temp dir");
        let db_path = dir.path().join("shared.sqlite3");

        // Act
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = db_path.clone();
                thread::spawn(move || Database::shared(path, MigrationPolicy::default()))
            })
            .collect();
        let databases: Vec<Database> = handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .expect("opener thread panicked")
                    .expect("failed to open shared db")
            })
            .collect();

        // Assert
        let first = &databases[0];
        assert!(databases
            .iter()
            .all(|database| Arc::ptr_eq(&database.worker, &first.worker)));
    }
}
