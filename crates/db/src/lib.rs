//! SQLite persistence for Shelf.
//!
//! One connection guarded by a mutex, shared as `Arc<Database>`. Every
//! connection is opened with foreign keys enforced and a `casefold(text)` SQL
//! function for Unicode-aware case-insensitive comparisons.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use shelf_kernel::settings::DatabaseSettings;

pub mod error;
pub mod migrate;

pub use error::{ConstraintKind, DbError, Result};

/// Shared handle to the SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    /// Open (and create if missing) the database described by `settings`.
    pub fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let conn = if settings.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&settings.path)
        }
        .map_err(|source| DbError::Open {
            path: settings.path.clone(),
            source,
        })?;

        configure(&conn, Duration::from_millis(settings.busy_timeout_ms))?;

        tracing::info!(target: "shelf-db", path = %settings.path, "database opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: settings.path.clone(),
        })
    }

    /// Open a private in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::connect(&DatabaseSettings::in_memory())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Begin a write transaction. The write lock is taken up front so
    /// concurrent writers queue on the busy timeout instead of deadlocking.
    pub fn write(&self) -> Result<Tx<'_>> {
        Tx::begin(self.lock()?, "BEGIN IMMEDIATE")
    }

    /// Begin a read transaction giving a consistent view across queries.
    pub fn read(&self) -> Result<Tx<'_>> {
        Tx::begin(self.lock()?, "BEGIN DEFERRED")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)?;
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|text| text.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Open transaction holding the connection lock.
///
/// Dropping a `Tx` without calling [`Tx::commit`] rolls it back.
pub struct Tx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> Tx<'a> {
    fn begin(conn: MutexGuard<'a, Connection>, statement: &str) -> Result<Self> {
        conn.execute_batch(statement)?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(target: "shelf-db", error = %err, "rollback on drop failed");
            }
        }
    }
}
