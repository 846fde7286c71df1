//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials. Deliberately covers wrong password, unknown
    /// username and deactivated accounts alike, so callers cannot enumerate
    /// which check failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session or token missing, expired, or failing verification.
    #[error("session missing or invalid")]
    SessionInvalid,

    /// The server-side credential configuration is absent.
    #[error("authentication not configured")]
    NotConfigured,

    /// Password hashing or verification infrastructure failed.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
