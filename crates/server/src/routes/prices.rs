//! Bulk price update route handler (store session only).

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};

use screenfix_core::DeviceModelId;

use crate::db::{PriceRepository, prices::RawPriceItem};
use crate::error::{AppError, Result};
use crate::middleware::RequireStoreUser;
use crate::state::AppState;

/// Build the prices router.
pub fn router() -> Router<AppState> {
    Router::new().route("/store/prices/bulk", post(bulk_update))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkPriceRequest {
    #[serde(default)]
    model_id: Value,
    #[serde(default)]
    items: Vec<RawPriceItem>,
}

/// POST /store/prices/bulk
///
/// Applies a batch of price overrides for the caller's store only; the store
/// scope comes from the session context, never from the request body.
async fn bulk_update(
    RequireStoreUser(user): RequireStoreUser,
    State(state): State<AppState>,
    Json(request): Json<BulkPriceRequest>,
) -> Result<Json<Value>> {
    let model_id = request
        .model_id
        .as_i64()
        .and_then(|id| i32::try_from(id).ok())
        .ok_or(AppError::Validation("modelId_invalid"))?;

    let updated = PriceRepository::new(state.pool())
        .apply_bulk(user.store_id, DeviceModelId::new(model_id), &request.items)
        .await?;

    tracing::info!(
        store_id = %user.store_id,
        model_id,
        updated,
        "bulk price update applied"
    );

    Ok(Json(json!({ "ok": true, "updated": updated })))
}
