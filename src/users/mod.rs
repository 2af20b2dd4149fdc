//! Registered users, kept in the unsharded store.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use crate::auth::CredentialHasher;
use crate::error::{Error, Result};
use crate::store::{TransactionalStore, format_datetime, is_unique_violation, parse_datetime};
use crate::types::User;

pub struct UserRegistry {
    store: Arc<TransactionalStore>,
    hasher: CredentialHasher,
}

impl UserRegistry {
    #[must_use]
    pub fn new(store: Arc<TransactionalStore>, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    /// Registers a user under a fresh UUID. Fails with
    /// [`Error::DuplicateUser`] if the login is taken.
    pub fn create_user(&self, login: &str, password: &str) -> Result<User> {
        // Hashed before the write lock is taken.
        let password_hash = self.hasher.hash(password)?;

        let user = self
            .store
            .write("create user", |tx, _| {
                if find_by_login(tx, login)?.is_some() {
                    return Err(Error::DuplicateUser {
                        login: login.to_string(),
                    });
                }

                let user = User {
                    uuid: Uuid::new_v4().to_string(),
                    login: login.to_string(),
                    password_hash,
                    created_at: Utc::now(),
                };

                insert_user(tx, &user)?;
                Ok(user)
            })
            .map_err(|e| e.context("create user", login))?;

        info!(login = %user.login, uuid = %user.uuid, "Created user");
        Ok(user)
    }

    pub fn check_user_existence(&self, login: &str) -> Result<bool> {
        self.store
            .read("check user existence", |tx, _| {
                Ok(find_by_login(tx, login)?.is_some())
            })
            .map_err(|e| e.context("check user existence", login))
    }

    pub fn get_user(&self, login: &str) -> Result<User> {
        self.store
            .read("get user", |tx, _| {
                find_by_login(tx, login)?.ok_or_else(|| Error::UserNotFound {
                    login: login.to_string(),
                })
            })
            .map_err(|e| e.context("get user", login))
    }
}

/// The unique index on `login` is what actually rules out duplicates; the
/// lookup in `create_user` only saves a wasted insert.
fn insert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (uuid, login, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            user.uuid,
            user.login,
            user.password_hash,
            format_datetime(&user.created_at)
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::DuplicateUser {
                login: user.login.clone(),
            }
        } else {
            e.into()
        }
    })?;
    Ok(())
}

/// Looks a user up inside a caller-owned transaction.
pub(crate) fn find_by_login(conn: &Connection, login: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT uuid, login, password_hash, created_at FROM users WHERE login = ?1",
            params![login],
            |row| {
                Ok(User {
                    uuid: row.get(0)?,
                    login: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    Ok(user)
}
