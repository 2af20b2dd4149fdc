use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_MAX_TOKEN_ATTEMPTS;
use crate::store::StoreOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: PathBuf,
    pub shards_count: usize,
    pub query_timeout_secs: u64,
    pub max_connections: usize,
    /// Explicit shard database files, in shard-index order. Derived from
    /// `data_dir` when empty.
    pub shard_paths: Vec<PathBuf>,
    pub unsharded_path: Option<PathBuf>,
}

impl DatabaseConfig {
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.max_connections,
            query_timeout: self.query_timeout(),
        }
    }

    #[must_use]
    pub fn shard_path(&self, index: usize) -> PathBuf {
        self.shard_paths
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.data_dir.join(format!("shard-{index}.db")))
    }

    #[must_use]
    pub fn unsharded_path(&self) -> PathBuf {
        self.unsharded_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("unsharded.db"))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            shards_count: 2,
            query_timeout_secs: 30,
            max_connections: StoreOptions::default().max_connections,
            shard_paths: Vec::new(),
            unsharded_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub access_token_ttl_secs: i64,
    pub max_token_attempts: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn access_token_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(self.access_token_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_secs: 3600,
            max_token_attempts: DEFAULT_MAX_TOKEN_ATTEMPTS,
        }
    }
}
