pub mod large_object;
mod pool;
mod schema;
mod sqlite;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;

use crate::error::{Error, Result};

pub use pool::{ConnectionPool, PooledConnection};
pub use schema::{SHARD_SCHEMA, UNSHARDED_SCHEMA};
pub use sqlite::{StoreOptions, TransactionalStore};

/// How a transaction touches the store.
///
/// SQLite transactions are serializable, which is at least as strong as the
/// read-committed isolation every operation here needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl TxMode {
    fn behavior(self) -> TransactionBehavior {
        match self {
            Self::ReadOnly => TransactionBehavior::Deferred,
            Self::ReadWrite => TransactionBehavior::Immediate,
        }
    }
}

/// Longest time any single transaction may be given.
pub const MAX_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Point in time after which a transaction is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    op: &'static str,
}

impl Deadline {
    /// Timeouts beyond [`MAX_TRANSACTION_TIMEOUT`] are clamped to it.
    #[must_use]
    pub fn after(timeout: Duration, op: &'static str) -> Self {
        Self {
            at: Instant::now() + timeout.min(MAX_TRANSACTION_TIMEOUT),
            op,
        }
    }

    #[must_use]
    pub fn op(&self) -> &'static str {
        self.op
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, or `None` once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            return Err(Error::Timeout { op: self.op });
        }
        Ok(())
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            DateTime::<Utc>::UNIX_EPOCH
        })
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
