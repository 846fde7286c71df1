//! Route handlers for the booking-service security core.

pub mod admin_sessions;
pub mod owner_auth;
pub mod prices;
pub mod store_auth;
pub mod webhooks;

use axum::Router;

use crate::middleware::rate_limit;
use crate::state::AppState;

/// Assemble the application routes.
///
/// The rate governor is layered on the auth route groups only; its
/// development-mode exemption is keyed off the original URI, so these
/// routers can move without silently losing it. The webhook receiver is
/// mounted outside development only when the feature flag enables it.
pub fn routes(state: &AppState) -> Router<AppState> {
    let governed = axum::middleware::from_fn_with_state(state.clone(), rate_limit::govern);

    let mut router = Router::new()
        .merge(owner_auth::router().layer(governed.clone()))
        .merge(store_auth::router().layer(governed))
        .merge(admin_sessions::router())
        .merge(prices::router());

    let webhook_active = !state.config().mode.is_production() || state.config().webhook_enabled;
    if webhook_active {
        router = router.merge(webhooks::router());
    } else {
        tracing::info!("webhook receiver disabled outside development");
    }

    router
}
