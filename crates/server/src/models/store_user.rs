//! Store-employee account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use screenfix_core::{StoreId, StoreUserId, Username};

/// A store-employee account.
///
/// Provisioned out of band; this core only reads it during login and session
/// validation. The password hash is handled separately by the repository so
/// it never rides along on this struct.
#[derive(Debug, Clone)]
pub struct StoreUser {
    pub id: StoreUserId,
    pub username: Username,
    pub store_id: StoreId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-request store identity attached by the store-session guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreContext {
    pub store_id: StoreId,
    pub store_user_id: StoreUserId,
    pub username: Username,
    pub store_name: String,
    pub store_city: String,
}
