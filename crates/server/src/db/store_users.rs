//! Store-user repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use screenfix_core::{StoreId, StoreUserId, Username};

use super::RepositoryError;
use crate::models::StoreUser;

#[derive(sqlx::FromRow)]
struct StoreUserRow {
    id: i32,
    username: String,
    password_hash: String,
    store_id: i32,
    active: bool,
    created_at: DateTime<Utc>,
}

/// Repository for store-user database operations.
pub struct StoreUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreUserRepository<'a> {
    /// Create a new store-user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a store user by normalized username, returning the account
    /// together with its password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored username is invalid.
    pub async fn get_with_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(StoreUser, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreUserRow>(
            r"
            SELECT id, username, password_hash, store_id, active, created_at
            FROM store_user
            WHERE username = $1
            ",
        )
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => {
                let username = Username::parse(&r.username).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
                })?;

                Ok(Some((
                    StoreUser {
                        id: StoreUserId::new(r.id),
                        username,
                        store_id: StoreId::new(r.store_id),
                        active: r.active,
                        created_at: r.created_at,
                    },
                    r.password_hash,
                )))
            }
            None => Ok(None),
        }
    }
}
