//! Shared `DuckDB` instance with reusable connection handles.
//!
//! `Connection::open` on the same file twice yields two independent database instances that do
//! not see each other's writes. [`ConnectionPool`] opens the file once and leases clones of that
//! primary connection, so every lease works against the same instance.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::Connection;

struct SharedDatabase {
    db_path: PathBuf,
    /// Kept open for the lifetime of the pool; leases are cloned from it.
    primary: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

/// Connection handles over one `DuckDB` instance.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<SharedDatabase>,
}

impl ConnectionPool {
    /// Open (or create) the database file and keep at most `max_idle` spare handles.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let primary = Connection::open(&db_path)?;
        primary.execute_batch("PRAGMA disable_progress_bar;")?;

        Ok(Self {
            shared: Arc::new(SharedDatabase {
                db_path,
                primary: Mutex::new(primary),
                idle: Mutex::new(Vec::new()),
                max_idle: max_idle.max(1),
            }),
        })
    }

    /// Lease a handle, reusing an idle one when available.
    ///
    /// # Errors
    /// Returns an error if a new handle cannot be cloned from the primary connection.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let idle = self
            .shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let connection = match idle {
            Some(connection) => connection,
            None => self
                .shared
                .primary
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_clone()?,
        };

        Ok(PooledConnection {
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.shared.db_path
    }

    fn idle_count(&self) -> usize {
        self.shared
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A leased handle; goes back to the idle list on drop unless the list is full.
pub struct PooledConnection {
    shared: Arc<SharedDatabase>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection,
            None => unreachable!("handle is only taken in drop"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let mut idle = self
                .shared
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if idle.len() < self.shared.max_idle {
                idle.push(connection);
            }
        }
    }
}
