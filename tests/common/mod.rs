#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;

use assetvault::config::Config;
use assetvault::server::{AppState, create_router};
use assetvault::services::Services;

pub const SHARDS: usize = 4;

/// A full set of stores in a temp dir, removed on drop.
pub struct TestVault {
    pub temp_dir: TempDir,
    pub config: Config,
    pub services: Arc<Services>,
}

impl TestVault {
    pub fn open() -> Self {
        Self::open_with(|_| {})
    }

    pub fn open_with(configure: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut config = Config::default();
        config.database.data_dir = temp_dir.path().join("data");
        config.database.shards_count = SHARDS;
        configure(&mut config);

        let services = Services::open(&config).expect("open services");

        Self {
            temp_dir,
            config,
            services: Arc::new(services),
        }
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState::new(
            self.services.clone(),
            self.config.server.body_limit(),
        ));
        create_router(state)
    }

    /// Registers a user and returns its UUID.
    pub fn user(&self, login: &str) -> String {
        self.services
            .users
            .create_user(login, "password")
            .expect("create user")
            .uuid
    }
}

/// Deterministic, non-repeating-looking content of `len` bytes.
pub fn sample(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}
