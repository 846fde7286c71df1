//! Store-session repository.
//!
//! The `store_session` table is owned by this repository and the kill-switch
//! operations below; no other component touches it.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use screenfix_core::{StoreId, StoreUserId, Username};

use super::RepositoryError;
use crate::models::{StoreContext, StoreSession};

#[derive(sqlx::FromRow)]
struct SessionContextRow {
    store_id: i32,
    store_user_id: i32,
    username: String,
    store_name: String,
    store_city: String,
    expires_at: DateTime<Utc>,
    active: bool,
}

/// Repository for store-session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a session for a store user with the given time-to-live.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_user_id: StoreUserId,
        ttl: Duration,
    ) -> Result<StoreSession, RepositoryError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            r"
            INSERT INTO store_session (id, store_user_id, expires_at)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(id)
        .bind(store_user_id.as_i32())
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(StoreSession {
            id,
            store_user_id,
            expires_at,
            created_at: now,
        })
    }

    /// Resolve a session ID to the store context it authorizes.
    ///
    /// Returns `None` when the session does not exist, is expired, or the
    /// linked user has been deactivated. Expired rows are deleted on sight so
    /// the table does not depend on the sweep for correctness.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored username is invalid.
    pub async fn find_context(&self, id: Uuid) -> Result<Option<StoreContext>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionContextRow>(
            r"
            SELECT su.store_id,
                   su.id AS store_user_id,
                   su.username,
                   s.name AS store_name,
                   s.city AS store_city,
                   ss.expires_at,
                   su.active
            FROM store_session ss
            JOIN store_user su ON su.id = ss.store_user_id
            JOIN store s ON s.id = su.store_id
            WHERE ss.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if row.expires_at <= Utc::now() {
            self.delete(id).await?;
            return Ok(None);
        }

        if !row.active {
            return Ok(None);
        }

        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Some(StoreContext {
            store_id: StoreId::new(row.store_id),
            store_user_id: StoreUserId::new(row.store_user_id),
            username,
            store_name: row.store_name,
            store_city: row.store_city,
        }))
    }

    /// Delete a single session. Deleting a missing session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM store_session WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Kill-switch: delete every store session, returning how many existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM store_session")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Kill-switch: delete the sessions of one store's users, returning how
    /// many matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_for_store(&self, store_id: StoreId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM store_session
            USING store_user
            WHERE store_session.store_user_id = store_user.id
              AND store_user.store_id = $1
            ",
        )
        .bind(store_id.as_i32())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired sessions. Validation rejects them regardless; this just
    /// keeps the table small.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM store_session WHERE expires_at <= now()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
