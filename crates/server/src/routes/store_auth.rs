//! Store authentication route handlers.
//!
//! Store sessions are server-side rows: logout deletes the row, which is a
//! true revocation.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::middleware::{RequireStoreUser, cookie_value};
use crate::services::session::{
    LoginAttempt, STORE_COOKIE, SessionProvider, StoreSessions, build_cookie, clear_cookie,
};
use crate::state::AppState;

/// Build the store auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store-auth/login", post(login))
        .route("/store-auth/logout", post(logout))
        .route("/store-auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /store-auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let sessions = StoreSessions::new(state.pool());

    let issued = sessions
        .issue(LoginAttempt {
            username: request.username,
            password: request.password,
        })
        .await?;
    let user = sessions.validate(&issued.value).await?;

    // Cookie lifetime mirrors the database row's expiry
    let max_age = (issued.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = build_cookie(
        STORE_COOKIE,
        &issued.value,
        max_age,
        state.config().mode.is_production(),
    );

    tracing::info!(
        username = %user.username,
        store_id = %user.store_id,
        "store user logged in"
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true, "user": user })),
    )
        .into_response())
}

/// POST /store-auth/logout
///
/// Deletes the server-side session row and clears the cookie. Safe to call
/// repeatedly; a second logout finds nothing to delete and still succeeds.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if let Some(session_id) = cookie_value(&headers, STORE_COOKIE) {
        StoreSessions::new(state.pool()).revoke(&session_id).await?;
    }

    let cookie = clear_cookie(STORE_COOKIE, state.config().mode.is_production());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true })),
    )
        .into_response())
}

/// GET /store-auth/me
async fn me(RequireStoreUser(user): RequireStoreUser) -> Json<Value> {
    Json(json!({ "ok": true, "user": user }))
}
