//! Owner identity derived from a validated token.

use serde::{Deserialize, Serialize};

/// The authenticated owner, reconstructed per-request from token claims.
///
/// Never persisted: created when the guard verifies the cookie's token and
/// discarded with the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerPrincipal {
    /// Token subject; always `"owner"` for valid tokens.
    pub subject: String,
    /// Owner login name embedded in the token.
    pub username: String,
}
