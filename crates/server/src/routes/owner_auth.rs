//! Owner authentication route handlers.
//!
//! The owner scheme is stateless: login signs a token, logout can only clear
//! the cookie.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::middleware::{RequireOwner, cookie_value};
use crate::services::session::{
    LoginAttempt, OWNER_COOKIE, OWNER_TOKEN_TTL_SECONDS, OwnerSessions, SessionProvider,
    build_cookie, clear_cookie,
};
use crate::state::AppState;

/// Build the owner auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let sessions = OwnerSessions::new(state.config());

    let issued = sessions
        .issue(LoginAttempt {
            username: request.username,
            password: request.password,
        })
        .await?;
    let principal = sessions.validate(&issued.value).await?;

    let cookie = build_cookie(
        OWNER_COOKIE,
        &issued.value,
        OWNER_TOKEN_TTL_SECONDS,
        state.config().mode.is_production(),
    );

    tracing::info!(username = %principal.username, "owner logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "ok": true,
            "role": principal.subject,
            "username": principal.username,
        })),
    )
        .into_response())
}

/// POST /auth/logout
///
/// Clears the cookie. The token itself stays valid until it expires; the
/// provider's `revoke` is a documented no-op for this scheme.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookie_value(&headers, OWNER_COOKIE) {
        let _ = OwnerSessions::new(state.config()).revoke(&token).await;
    }

    let cookie = clear_cookie(OWNER_COOKIE, state.config().mode.is_production());

    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

/// GET /auth/me
async fn me(RequireOwner(principal): RequireOwner) -> Json<Value> {
    Json(json!({
        "role": principal.subject,
        "username": principal.username,
    }))
}
