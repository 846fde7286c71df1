//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::SessionRepository;
use crate::middleware::RateGovernor;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database pool, configuration and the rate
/// governor's window state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    governor: RateGovernor,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let governor = RateGovernor::new(config.mode);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                governor,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the rate governor.
    #[must_use]
    pub fn governor(&self) -> &RateGovernor {
        &self.inner.governor
    }

    /// Spawn the hourly sweep deleting expired store sessions.
    ///
    /// Validation rejects expired sessions regardless; the sweep only keeps
    /// the table from accumulating dead rows.
    pub fn start_session_sweep(&self) {
        let state = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
            loop {
                interval.tick().await;
                match SessionRepository::new(state.pool()).purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "expired store sessions purged"),
                    Err(e) => tracing::warn!(error = %e, "session sweep failed"),
                }
            }
        });
    }
}
