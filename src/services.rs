use std::fs;
use std::sync::Arc;

use tracing::info;

use crate::assets::AssetRepository;
use crate::auth::{AuthTokenService, CredentialHasher};
use crate::config::{AuthConfig, Config};
use crate::error::{Error, Result};
use crate::store::{SHARD_SCHEMA, TransactionalStore, UNSHARDED_SCHEMA};
use crate::users::UserRegistry;

/// Every core service, built once at startup and shared by handle.
pub struct Services {
    pub assets: AssetRepository,
    pub auth: AuthTokenService,
    pub users: UserRegistry,
    unsharded: Arc<TransactionalStore>,
}

impl Services {
    /// Opens every store named by `config` and makes sure its schema exists.
    pub fn open(config: &Config) -> Result<Self> {
        let db = &config.database;
        fs::create_dir_all(&db.data_dir).map_err(|e| {
            Error::Config(format!("cannot create data dir {}: {e}", db.data_dir.display()))
        })?;

        let options = db.store_options();
        let shards = (0..db.shards_count)
            .map(|i| TransactionalStore::open(format!("shard-{i}"), db.shard_path(i), options))
            .collect::<Result<Vec<_>>>()?;
        let unsharded = TransactionalStore::open("unsharded", db.unsharded_path(), options)?;

        let services = Self::from_stores(shards, unsharded, &config.auth)?;
        info!(
            shards = db.shards_count,
            data_dir = %db.data_dir.display(),
            "Opened stores"
        );
        Ok(services)
    }

    /// Wires services over already-open stores. Shard order fixes shard
    /// indices, so it must be stable across restarts.
    pub fn from_stores(
        shards: Vec<TransactionalStore>,
        unsharded: TransactionalStore,
        auth: &AuthConfig,
    ) -> Result<Self> {
        for shard in &shards {
            shard.initialize(SHARD_SCHEMA)?;
        }
        unsharded.initialize(UNSHARDED_SCHEMA)?;

        let unsharded = Arc::new(unsharded);
        let hasher = CredentialHasher::new();

        Ok(Self {
            assets: AssetRepository::new(shards)?,
            auth: AuthTokenService::new(
                unsharded.clone(),
                hasher.clone(),
                auth.access_token_ttl(),
                auth.max_token_attempts,
            ),
            users: UserRegistry::new(unsharded.clone(), hasher),
            unsharded,
        })
    }

    /// Pings the unsharded store and every shard.
    pub fn health_check(&self) -> Result<()> {
        self.unsharded
            .ping()
            .map_err(|e| e.context("ping store", self.unsharded.name()))?;
        self.assets.ping()
    }
}
