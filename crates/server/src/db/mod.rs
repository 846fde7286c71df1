//! Database operations for the booking-service `PostgreSQL`.
//!
//! ## Tables
//!
//! - `store` - Store locations (read-only here)
//! - `store_user` - Store-employee accounts (provisioned out of band)
//! - `store_session` - Revocable server-side sessions, owned by the session
//!   service and the kill-switch exclusively
//! - `device_model` / `screen_option` - Catalog references (read-only here)
//! - `screen_option_price` - Per-store price overrides, mutated only by the
//!   bulk reconciliation transaction
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run on startup.
//!
//! Queries use the sqlx runtime API with `FromRow` models so the crate builds
//! without a live database.

pub mod prices;
pub mod sessions;
pub mod store_users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use prices::{BulkPriceError, PriceRepository};
pub use sessions::SessionRepository;
pub use store_users::StoreUserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
