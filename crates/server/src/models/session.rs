//! Server-side store session record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use screenfix_core::StoreUserId;

/// A persisted store session.
///
/// Created on successful store login, read on every store-authenticated
/// request and deleted on logout, by the expiry sweep, or by the kill-switch.
/// A session whose `expires_at` is in the past never authorizes a request.
#[derive(Debug, Clone)]
pub struct StoreSession {
    pub id: Uuid,
    pub store_user_id: StoreUserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
