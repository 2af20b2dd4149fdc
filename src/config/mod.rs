//! Process configuration: a TOML file, then environment overrides.

mod server;
mod storage;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::shard::BUCKET_NUMBER;
use crate::store::MAX_TRANSACTION_TIMEOUT;

pub use server::{DEFAULT_BODY_MAX_SIZE, DEFAULT_PORT, ServerConfig};
pub use storage::{AuthConfig, DatabaseConfig};

pub const CONFIG_ENV: &str = "ASSETVAULT_CONFIG";

const SHARDS_COUNT_ENV: &str = "ASSETVAULT_SHARDS_COUNT";
const QUERY_TIMEOUT_ENV: &str = "ASSETVAULT_QUERY_TIMEOUT_SECS";
const ACCESS_TOKEN_TTL_ENV: &str = "ASSETVAULT_ACCESS_TOKEN_TTL_SECS";
const DATA_DIR_ENV: &str = "ASSETVAULT_DATA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Loads the config file at `path`, falling back to `ASSETVAULT_CONFIG`
    /// and then to built-in defaults, and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Applies overrides from `lookup`, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(SHARDS_COUNT_ENV) {
            self.database.shards_count = parse_var(SHARDS_COUNT_ENV, &value)?;
        }
        if let Some(value) = lookup(QUERY_TIMEOUT_ENV) {
            self.database.query_timeout_secs = parse_var(QUERY_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(ACCESS_TOKEN_TTL_ENV) {
            self.auth.access_token_ttl_secs = parse_var(ACCESS_TOKEN_TTL_ENV, &value)?;
        }
        if let Some(value) = lookup(DATA_DIR_ENV) {
            self.database.data_dir = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        if db.shards_count == 0 {
            return Err(Error::Config("database.shards_count must be at least 1".to_string()));
        }
        if db.shards_count as u64 > BUCKET_NUMBER {
            return Err(Error::Config(format!(
                "database.shards_count must not exceed {BUCKET_NUMBER}"
            )));
        }
        if !db.shard_paths.is_empty() && db.shard_paths.len() != db.shards_count {
            return Err(Error::Config(format!(
                "database.shard_paths lists {} files but shards_count is {}",
                db.shard_paths.len(),
                db.shards_count
            )));
        }
        if db.query_timeout_secs == 0 {
            return Err(Error::Config("database.query_timeout_secs must be positive".to_string()));
        }
        if db.query_timeout_secs > MAX_TRANSACTION_TIMEOUT.as_secs() {
            return Err(Error::Config(format!(
                "database.query_timeout_secs must be at most {}",
                MAX_TRANSACTION_TIMEOUT.as_secs()
            )));
        }
        if db.max_connections == 0 {
            return Err(Error::Config("database.max_connections must be at least 1".to_string()));
        }
        if self.auth.access_token_ttl_secs <= 0
            || TimeDelta::try_seconds(self.auth.access_token_ttl_secs).is_none()
        {
            return Err(Error::Config(
                "auth.access_token_ttl_secs must be a positive number of seconds".to_string(),
            ));
        }
        if self.auth.max_token_attempts == 0 {
            return Err(Error::Config("auth.max_token_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has an invalid value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3005);
        assert_eq!(config.server.body_max_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.database.shards_count, 2);
        assert_eq!(config.database.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.auth.access_token_ttl(), TimeDelta::hours(1));
        assert_eq!(config.auth.max_token_attempts, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [database]
            data_dir = "/var/lib/assetvault"
            shards_count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.shards_count, 4);
        assert_eq!(config.database.query_timeout_secs, 30);
        assert_eq!(
            config.database.shard_path(3),
            PathBuf::from("/var/lib/assetvault/shard-3.db")
        );
        assert_eq!(
            config.database.unsharded_path(),
            PathBuf::from("/var/lib/assetvault/unsharded.db")
        );
    }

    #[test]
    fn test_explicit_paths() {
        let config = Config::from_toml(
            r#"
            [database]
            shards_count = 2
            shard_paths = ["/a.db", "/b.db"]
            unsharded_path = "/users.db"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.database.shard_path(1), PathBuf::from("/b.db"));
        assert_eq!(config.database.unsharded_path(), PathBuf::from("/users.db"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ASSETVAULT_SHARDS_COUNT", "8"),
            ("ASSETVAULT_QUERY_TIMEOUT_SECS", "5"),
            ("ASSETVAULT_ACCESS_TOKEN_TTL_SECS", "60"),
            ("ASSETVAULT_DATA_DIR", "/tmp/vault"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.shards_count, 8);
        assert_eq!(config.database.query_timeout_secs, 5);
        assert_eq!(config.auth.access_token_ttl_secs, 60);
        assert_eq!(config.database.data_dir, PathBuf::from("/tmp/vault"));
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "ASSETVAULT_SHARDS_COUNT").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.database.shards_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.shard_paths = vec![PathBuf::from("/only-one.db")];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.query_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.query_timeout_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.access_token_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.shards_count = BUCKET_NUMBER as usize + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("assetvault.toml");
        fs::write(&path, "[auth]\naccess_token_ttl_secs = 120\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.auth.access_token_ttl_secs, 120);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml("[server]\nport = \"high\""),
            Err(Error::Config(_))
        ));
    }
}
