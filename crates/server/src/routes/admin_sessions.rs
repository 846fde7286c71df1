//! Session kill-switch route handlers (owner only).
//!
//! Both operations are destructive and unconditional; any confirmation step
//! belongs to the caller.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use serde_json::{Value, json};

use screenfix_core::StoreId;

use crate::db::SessionRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireOwner;
use crate::state::AppState;

/// Build the kill-switch router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/sessions/revoke-all", post(revoke_all))
        .route("/admin/sessions/revoke/{store_id}", post(revoke_store))
}

/// POST /admin/sessions/revoke-all
///
/// Emergency-wide lockout: every store session is deleted.
async fn revoke_all(
    RequireOwner(_): RequireOwner,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let cleared = SessionRepository::new(state.pool()).delete_all().await?;

    tracing::warn!(cleared, "kill-switch revoked all store sessions");

    Ok(Json(json!({ "ok": true, "cleared": cleared })))
}

/// POST /admin/sessions/revoke/{store_id}
///
/// Deletes the sessions belonging to one store's users. The identifier is
/// validated before any query executes.
async fn revoke_store(
    RequireOwner(_): RequireOwner,
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<Value>> {
    let store_id: i32 = store_id
        .parse()
        .map_err(|_| AppError::Validation("storeId_invalid"))?;

    let cleared = SessionRepository::new(state.pool())
        .delete_for_store(StoreId::new(store_id))
        .await?;

    tracing::warn!(store_id, cleared, "kill-switch revoked store sessions");

    Ok(Json(json!({ "ok": true, "cleared": cleared })))
}
