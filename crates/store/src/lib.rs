/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Mail storage engine (C3): Maildir-on-disk + SQLite-metadata hybrid.
//!
//! SQLite access is blocking; every public method dispatches its
//! transaction onto `tokio::task::spawn_blocking`, keeping blocking storage
//! calls off the async executor's threads (§5).

use std::{path::PathBuf, sync::Arc};

use r2d2_sqlite::SqliteConnectionManager;
use utils::Deadline;

pub mod flags;
pub mod janitor;
pub mod maildir;
pub mod ops;
pub mod schema;
pub mod search;
pub mod types;

pub use flags::Flags;
pub use ops::AppendTarget;
pub use types::*;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct Store {
    pub(crate) pool: Arc<Pool>,
    pub maildir_root: PathBuf,
}

#[derive(Debug, Clone)]
pub enum StoreError {
    NotFound,
    Duplicate,
    QuotaExceeded,
    DeadlineExceeded,
    Io(String),
    Sql(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "not found"),
            StoreError::Duplicate => write!(f, "duplicate"),
            StoreError::QuotaExceeded => write!(f, "quota exceeded"),
            StoreError::DeadlineExceeded => write!(f, "deadline exceeded"),
            StoreError::Io(s) => write!(f, "io error: {s}"),
            StoreError::Sql(s) => write!(f, "sql error: {s}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sql(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl Store {
    /// Opens (creating if needed) the SQLite metadata database at
    /// `sqlite_path` in WAL mode with a pool sized `num_cpus * 2` (§5), and
    /// applies pending `schema_migrations` in ascending order (§6).
    pub fn open(sqlite_path: PathBuf, maildir_root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&maildir_root)?;
        if let Some(parent) = sqlite_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(&sqlite_path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        });
        let pool = r2d2::Pool::builder()
            .max_size((num_cpus::get() * 2) as u32)
            .build(manager)
            .map_err(|e| StoreError::Sql(e.to_string()))?;
        {
            let mut conn = pool.get().map_err(|e| StoreError::Sql(e.to_string()))?;
            schema::migrate(&mut conn)?;
        }
        Ok(Store {
            pool: Arc::new(pool),
            maildir_root,
        })
    }

    /// In-memory store for unit/integration tests; same schema, a temp
    /// maildir root under the OS temp directory.
    pub fn open_test() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!(
            "mailstore-test-{}-{}",
            std::process::id(),
            utils::rand_hex::maildir_rand()
        ));
        std::fs::create_dir_all(&dir)?;
        Self::open(dir.join("index.sqlite3"), dir.join("maildir"))
    }

    pub(crate) fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| StoreError::Sql(e.to_string()))
    }

    /// Runs a blocking closure with a pooled connection on the blocking
    /// thread pool, enforcing `deadline`. The entry point other crates use
    /// to run their own queries against the shared SQLite pool without
    /// reimplementing connection checkout and deadline handling.
    pub async fn with_conn<T, F>(&self, deadline: Deadline, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let handle = tokio::task::spawn_blocking(move || -> Result<T> {
            let mut conn = pool.get().map_err(|e| StoreError::Sql(e.to_string()))?;
            f(&mut conn)
        });
        match deadline.run(handle).await {
            Ok(join_result) => join_result.map_err(|e| StoreError::Sql(e.to_string()))?,
            Err(_) => Err(StoreError::DeadlineExceeded),
        }
    }
}
