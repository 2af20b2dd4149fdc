use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub login: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub owner_uuid: String,
    pub blob_oid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(skip)]
    pub value: String,
    pub owner_uuid: String,
    pub issuing_ip: String,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    #[must_use]
    pub fn is_expired(&self, ttl: TimeDelta) -> bool {
        self.is_expired_at(ttl, Utc::now())
    }

    /// A token is live up to and including `created_at + ttl`.
    #[must_use]
    pub fn is_expired_at(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now > self.created_at + ttl
    }
}
