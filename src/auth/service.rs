use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use super::{CredentialHasher, RandomTokenGenerator, TokenGenerator};
use crate::error::{Error, Result};
use crate::retry::retry;
use crate::store::{TransactionalStore, format_datetime, is_unique_violation, parse_datetime};
use crate::types::AccessToken;
use crate::users::find_by_login;

pub const DEFAULT_MAX_TOKEN_ATTEMPTS: u32 = 10;

/// Issues and renews bearer tokens against the unsharded store.
///
/// A user holds at most one token row. Every successful login rewrites it
/// with a fresh value, so earlier values stop resolving.
pub struct AuthTokenService {
    store: Arc<TransactionalStore>,
    hasher: CredentialHasher,
    generator: Box<dyn TokenGenerator>,
    ttl: TimeDelta,
    max_attempts: u32,
}

impl AuthTokenService {
    #[must_use]
    pub fn new(store: Arc<TransactionalStore>, hasher: CredentialHasher, ttl: TimeDelta, max_attempts: u32) -> Self {
        Self::with_generator(store, hasher, Box::new(RandomTokenGenerator), ttl, max_attempts)
    }

    #[must_use]
    pub fn with_generator(
        store: Arc<TransactionalStore>,
        hasher: CredentialHasher,
        generator: Box<dyn TokenGenerator>,
        ttl: TimeDelta,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            hasher,
            generator,
            ttl,
            max_attempts,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Verifies credentials and issues or renews the user's token in a
    /// single transaction.
    ///
    /// A token-value collision comes back as [`Error::DuplicateAccessToken`]
    /// with nothing written; see [`AuthTokenService::issue_token`] for the
    /// retrying variant.
    pub fn create_or_update_token(&self, login: &str, password: &str, issuing_ip: &str) -> Result<String> {
        self.store
            .write("create or update token", |tx, _| {
                let user = find_by_login(tx, login)?.ok_or_else(|| Error::UserNotFound {
                    login: login.to_string(),
                })?;

                if !self.hasher.verify(password, &user.password_hash)? {
                    return Err(Error::InvalidPassword {
                        login: login.to_string(),
                    });
                }

                let value = self.generator.generate();
                let created_at = format_datetime(&Utc::now());
                let args = params![value, user.uuid, issuing_ip, created_at];

                let result = if has_token(tx, &user.uuid)? {
                    tx.execute(
                        "UPDATE access_tokens SET token_value = ?1, ip_addr = ?3, created_at = ?4 WHERE owner_uuid = ?2",
                        args,
                    )
                } else {
                    tx.execute(
                        "INSERT INTO access_tokens (token_value, owner_uuid, ip_addr, created_at) VALUES (?1, ?2, ?3, ?4)",
                        args,
                    )
                };

                result.map_err(|e| {
                    if is_unique_violation(&e) {
                        Error::DuplicateAccessToken
                    } else {
                        e.into()
                    }
                })?;

                Ok(value)
            })
            .map_err(|e| e.context("create or update token", login))
    }

    /// [`AuthTokenService::create_or_update_token`], re-run from scratch on
    /// token-value collisions up to the configured number of attempts.
    pub fn issue_token(&self, login: &str, password: &str, issuing_ip: &str) -> Result<String> {
        let token = retry(self.max_attempts, |attempt| {
            let result = self.create_or_update_token(login, password, issuing_ip);
            if let Err(Error::DuplicateAccessToken) = &result {
                warn!(login, attempt, max_attempts = self.max_attempts, "Access token collision");
            }
            result
        })?;

        info!(login, "Issued access token");
        Ok(token)
    }

    pub fn get_token(&self, value: &str) -> Result<AccessToken> {
        self.store
            .read("get token", |tx, _| {
                find_by_value(tx, value)?.ok_or(Error::NotFoundAccessToken)
            })
            .map_err(|e| e.context("get token", "<redacted>"))
    }

    /// Resolves a bearer value to a live token. Expired tokens are reported
    /// as not found.
    pub fn authenticate(&self, value: &str) -> Result<AccessToken> {
        let token = self.get_token(value)?;
        if token.is_expired(self.ttl) {
            return Err(Error::NotFoundAccessToken);
        }
        Ok(token)
    }
}

fn has_token(conn: &Connection, owner_uuid: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM access_tokens WHERE owner_uuid = ?1",
            params![owner_uuid],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn find_by_value(conn: &Connection, value: &str) -> Result<Option<AccessToken>> {
    let token = conn
        .query_row(
            "SELECT token_value, owner_uuid, ip_addr, created_at FROM access_tokens WHERE token_value = ?1",
            params![value],
            |row| {
                Ok(AccessToken {
                    value: row.get(0)?,
                    owner_uuid: row.get(1)?,
                    issuing_ip: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    Ok(token)
}
