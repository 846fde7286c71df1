//! Authentication guards for route handlers.
//!
//! Extractors resolving the scheme cookies into typed principals before a
//! handler runs. Principals travel as extractor values, never as mutable
//! request state.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use crate::error::AppError;
use crate::models::{OwnerPrincipal, StoreContext};
use crate::services::session::{
    OWNER_COOKIE, OwnerSessions, STORE_COOKIE, SessionProvider, StoreSessions,
};
use crate::state::AppState;

/// Read a cookie value from the request headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;

    raw.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Extractor that requires a valid owner token.
///
/// Rejects with 401 `{"error":"unauthorized"}` when the cookie is missing or
/// its token fails signature/expiry verification.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireOwner(owner): RequireOwner,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", owner.username)
/// }
/// ```
pub struct RequireOwner(pub OwnerPrincipal);

impl<S> FromRequestParts<S> for RequireOwner
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = cookie_value(&parts.headers, OWNER_COOKIE).ok_or(AppError::Unauthorized)?;

        let principal = OwnerSessions::new(state.config())
            .validate(&token)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        Ok(Self(principal))
    }
}

/// Extractor that requires a valid store session.
///
/// Resolves the session cookie against the database (session joined to user
/// and store) and rejects with 401 when it is missing, expired, or the
/// linked user has been deactivated.
pub struct RequireStoreUser(pub StoreContext);

impl<S> FromRequestParts<S> for RequireStoreUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let session_id =
            cookie_value(&parts.headers, STORE_COOKIE).ok_or(AppError::Unauthorized)?;

        let context = StoreSessions::new(state.pool())
            .validate(&session_id)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        Ok(Self(context))
    }
}
