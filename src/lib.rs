//! # Assetvault
//!
//! Per-user binary asset storage over a sharded set of SQLite stores, with
//! login-issued bearer tokens. Usable both as a standalone binary and as a
//! library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! assetvault = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use assetvault::config::Config;
//! use assetvault::server::{AppState, create_router};
//! use assetvault::services::Services;
//!
//! let config = Config::load(None).unwrap();
//! let services = Arc::new(Services::open(&config).unwrap());
//!
//! let state = Arc::new(AppState::new(services, config.server.body_limit()));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `assetvault` binary. Disable with `default-features = false`.

pub mod assets;
pub mod auth;
pub mod config;
pub mod error;
pub mod retry;
pub mod server;
pub mod services;
pub mod shard;
pub mod store;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod users;
