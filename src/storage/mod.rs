pub mod repository;
pub mod schema;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Default bound on a single store call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of reader connections for file databases.
pub const DEFAULT_READER_POOL: usize = 4;

/// Database wraps one writer `tokio_rusqlite::Connection` and a small pool of
/// readers, all in WAL mode. Writes serialize through the writer's channel;
/// readers are handed out round-robin so concurrent aggregate queries do not
/// queue behind each other.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    readers: Arc<Vec<tokio_rusqlite::Connection>>,
    next_reader: Arc<AtomicUsize>,
    timeout: Duration,
}

impl Database {
    /// Open the database at the default path (`~/.brickyard/brickyard.db`).
    pub async fn open() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// `~/.brickyard/brickyard.db`, creating the directory if needed.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".brickyard");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Ok(dir.join("brickyard.db"))
    }

    /// Open the database at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with_pool(path, DEFAULT_READER_POOL).await
    }

    /// Open the database at the given path with `pool_size` reader connections.
    pub async fn open_with_pool(
        path: impl AsRef<std::path::Path>,
        pool_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let mut readers = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let reader = tokio_rusqlite::Connection::open(&path).await?;
            Self::init_reader(&reader).await?;
            readers.push(reader);
        }
        log::debug!(
            "Opened {} with {} reader connection(s)",
            path.display(),
            readers.len()
        );

        let db = Self {
            writer,
            readers: Arc::new(readers),
            next_reader: Arc::new(AtomicUsize::new(0)),
            timeout: DEFAULT_QUERY_TIMEOUT,
        };
        db.ensure_reference_data().await?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;

        // For in-memory, we share the same connection for reader/writer
        // since in-memory DBs are per-connection.
        let db = Self {
            readers: Arc::new(vec![writer.clone()]),
            writer,
            next_reader: Arc::new(AtomicUsize::new(0)),
            timeout: DEFAULT_QUERY_TIMEOUT,
        };
        db.ensure_reference_data().await?;
        Ok(db)
    }

    /// Return a copy of this handle whose store calls are bounded by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations = Migrations::new(vec![M::up(include_str!(
                "migrations/001_initial.sql"
            ))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;\
                 PRAGMA query_only=ON;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reader connection, rotating through the pool.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        &self.readers[idx]
    }

    /// Run `f` on a reader connection, bounded by the query timeout.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let call = self
            .reader()
            .call(move |conn| Ok::<Result<T>, rusqlite::Error>(f(conn)));
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome?,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }

    /// Run `f` on the writer connection, bounded by the query timeout.
    ///
    /// On timeout the caller stops waiting; a statement already handed to
    /// the writer thread still runs to completion or rollback there.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let call = self
            .writer
            .call(move |conn| Ok::<Result<T>, rusqlite::Error>(f(conn)));
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome?,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }

    /// Ensure the material type tables hold the known types.
    async fn ensure_reference_data(&self) -> Result<()> {
        self.writer
            .call(|conn| {
                schema::ensure_material_types(conn)?;
                Ok::<(), rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }
}
