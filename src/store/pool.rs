use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Duration;

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use super::{Deadline, TxMode};
use crate::error::{Error, Result};

/// Pragmas every pooled connection starts with.
#[derive(Debug)]
struct ConnectionSetup {
    busy_timeout: Duration,
}

impl CustomizeConnection<Connection, rusqlite::Error> for ConnectionSetup {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(())
    }
}

/// Fixed-size set of connections to one database file.
pub struct ConnectionPool {
    pool: Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    pub fn open(path: &Path, size: usize, busy_timeout: Duration) -> Result<Self> {
        let size = u32::try_from(size.max(1)).unwrap_or(u32::MAX);
        let pool = Pool::builder()
            .max_size(size)
            .min_idle(Some(size))
            .connection_timeout(busy_timeout)
            .connection_customizer(Box::new(ConnectionSetup { busy_timeout }))
            .build(SqliteConnectionManager::file(path))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.pool.max_size()
    }

    /// Checks a connection out, waiting no longer than `deadline` allows.
    pub fn get(&self, deadline: &Deadline) -> Result<PooledConnection> {
        let exhausted = || Error::Timeout {
            op: "acquire connection",
        };
        let remaining = deadline.remaining().ok_or_else(exhausted)?;
        let conn = self.pool.get_timeout(remaining).map_err(|e| {
            tracing::debug!(op = deadline.op(), error = %e, "Connection checkout failed");
            exhausted()
        })?;
        Ok(PooledConnection { conn })
    }
}

/// Checked-out connection; undoes per-transaction state before it goes back.
pub struct PooledConnection {
    conn: r2d2::PooledConnection<SqliteConnectionManager>,
}

impl PooledConnection {
    /// Installs the deadline interrupt, bounds lock waits by the time left,
    /// and for read-only work sets `query_only`.
    pub(crate) fn arm(&self, deadline: &Deadline, mode: TxMode) -> Result<()> {
        let remaining = deadline.remaining().ok_or(Error::Timeout { op: deadline.op() })?;
        self.busy_timeout(busy_budget(remaining))?;

        let deadline = *deadline;
        self.progress_handler(1000, Some(move || deadline.is_expired()));
        if mode == TxMode::ReadOnly {
            self.pragma_update(None, "query_only", true)?;
        }
        Ok(())
    }
}

// Rounded up to whole milliseconds so a lock wait that gives up has always
// used the full budget.
fn busy_budget(remaining: Duration) -> Duration {
    let millis = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
    let millis = millis.saturating_add(1).min(i32::MAX as u64);
    Duration::from_millis(millis)
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Failed to roll back abandoned transaction: {e}");
            }
        }
        if let Err(e) = self.conn.pragma_update(None, "query_only", false) {
            tracing::warn!("Failed to reset query_only on pooled connection: {e}");
        }
    }
}
