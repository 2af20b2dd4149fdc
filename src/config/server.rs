use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3005;
pub const DEFAULT_BODY_MAX_SIZE: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes.
    pub body_max_size: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// `body_max_size` clamped to what this platform can address.
    #[must_use]
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.body_max_size).unwrap_or(usize::MAX)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            body_max_size: DEFAULT_BODY_MAX_SIZE,
        }
    }
}
