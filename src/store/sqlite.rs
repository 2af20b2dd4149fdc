use std::path::Path;
use std::time::Duration;

use rusqlite::{ErrorCode, Transaction};

use super::pool::ConnectionPool;
use super::{Deadline, MAX_TRANSACTION_TIMEOUT, TxMode};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub max_connections: usize,
    pub query_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 4,
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// One backing partition: a pool of SQLite connections plus the rule that
/// every unit of work runs inside a single deadline-bounded transaction.
pub struct TransactionalStore {
    name: String,
    pool: ConnectionPool,
    query_timeout: Duration,
}

impl TransactionalStore {
    pub fn open<P: AsRef<Path>>(name: impl Into<String>, db_path: P, options: StoreOptions) -> Result<Self> {
        let name = name.into();
        let pool = ConnectionPool::open(
            db_path.as_ref(),
            options.max_connections,
            options.query_timeout.min(MAX_TRANSACTION_TIMEOUT),
        )
        .map_err(|e| e.context("open store", name.clone()))?;

        tracing::debug!(
            store = %name,
            path = %db_path.as_ref().display(),
            connections = pool.size(),
            "Opened store"
        );

        Ok(Self {
            name,
            pool,
            query_timeout: options.query_timeout,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn initialize(&self, schema: &str) -> Result<()> {
        let deadline = Deadline::after(self.query_timeout, "initialize schema");
        let conn = self.pool.get(&deadline)?;
        conn.arm(&deadline, TxMode::ReadWrite)?;
        conn.execute_batch(schema)?;
        Ok(())
    }

    pub fn ping(&self) -> Result<()> {
        self.with_transaction(TxMode::ReadOnly, "ping", |tx, _| {
            tx.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    /// Runs `body` inside one transaction and commits if it returns `Ok`.
    ///
    /// An `Err` from `body` rolls the transaction back and is returned
    /// unchanged. A failed commit is reported as [`Error::Commit`]. Work that
    /// outlives the store's query timeout is interrupted and surfaces as
    /// [`Error::Timeout`], as does waiting on another writer's lock until the
    /// deadline passes. The connection goes back to the pool on every exit
    /// path, unwinding included.
    pub fn with_transaction<T, F>(&self, mode: TxMode, op: &'static str, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>, &Deadline) -> Result<T>,
    {
        let deadline = Deadline::after(self.query_timeout, op);
        let mut conn = self.pool.get(&deadline)?;
        conn.arm(&deadline, mode)?;

        let tx = conn
            .transaction_with_behavior(mode.behavior())
            .map_err(|e| lock_error(e, &deadline, Error::Begin))?;

        let value = match body(&tx, &deadline) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(store = %self.name, op, error = ?e, "Rolling back transaction");
                return Err(e);
            }
        };

        deadline.check()?;
        tx.commit()
            .map_err(|e| lock_error(e, &deadline, Error::Commit))?;

        Ok(value)
    }

    pub fn read<T, F>(&self, op: &'static str, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>, &Deadline) -> Result<T>,
    {
        self.with_transaction(TxMode::ReadOnly, op, body)
    }

    pub fn write<T, F>(&self, op: &'static str, body: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>, &Deadline) -> Result<T>,
    {
        self.with_transaction(TxMode::ReadWrite, op, body)
    }
}

/// Classifies a failed `BEGIN` or `COMMIT`. Giving up on a lock held by
/// another connection once the deadline has passed is a timeout.
fn lock_error(e: rusqlite::Error, deadline: &Deadline, wrap: fn(rusqlite::Error) -> Error) -> Error {
    let contended = matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    );
    if contended && deadline.is_expired() {
        return Error::Timeout { op: deadline.op() };
    }
    match Error::from(e) {
        Error::Database(e) => wrap(e),
        other => other,
    }
}
