//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that converts every failure into a
//! stable JSON error code and captures server-side errors to Sentry before
//! responding. All route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::{BulkPriceError, RepositoryError};
use crate::services::auth::AuthError;

/// Application-level error type for the booking service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Request lacks a valid session or token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed input; the code is returned verbatim to the client.
    #[error("Validation failed: {0}")]
    Validation(&'static str),

    /// A required server-side secret is not configured.
    #[error("Not configured")]
    NotConfigured,

    /// Rate governor tripped.
    #[error("Rate limited")]
    RateLimited {
        /// Seconds until the current window resets.
        retry_after_seconds: u64,
    },

    /// Storage failure inside the bulk price transaction; already rolled back.
    #[error("Bulk update failed: {0}")]
    BulkUpdateFailed(sqlx::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The stable error code reported to the client.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "internal_error",
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::SessionInvalid => "unauthorized",
                AuthError::NotConfigured => "not_configured",
                AuthError::PasswordHash | AuthError::Repository(_) => "internal_error",
            },
            Self::Unauthorized => "unauthorized",
            Self::Validation(code) => *code,
            Self::NotConfigured => "not_configured",
            Self::RateLimited { .. } => "rate_limited",
            Self::BulkUpdateFailed(_) => "bulk_update_failed",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::BulkUpdateFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::SessionInvalid => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::PasswordHash | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<BulkPriceError> for AppError {
    fn from(err: BulkPriceError) -> Self {
        match err {
            BulkPriceError::PriceInvalid => Self::Validation("price_invalid"),
            BulkPriceError::PriceRequired => Self::Validation("price_required"),
            BulkPriceError::Database(e) => Self::BulkUpdateFailed(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry; client errors stay local
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let body = match &self {
            Self::RateLimited {
                retry_after_seconds,
            } => json!({
                "error": self.code(),
                "retryAfterSeconds": retry_after_seconds,
            }),
            _ => json!({ "error": self.code() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Unauthorized.code(), "unauthorized");
        assert_eq!(AppError::Validation("price_invalid").code(), "price_invalid");
        assert_eq!(
            AppError::RateLimited {
                retry_after_seconds: 30
            }
            .code(),
            "rate_limited"
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).code(),
            "invalid_credentials"
        );
        assert_eq!(AppError::Internal("boom".to_string()).code(), "internal_error");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(get_status(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(AppError::Validation("modelId_invalid")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited {
                retry_after_seconds: 1
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::NotConfigured),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_display() {
        let err = AppError::RateLimited {
            retry_after_seconds: 12,
        };
        assert_eq!(err.to_string(), "Rate limited");
    }
}
