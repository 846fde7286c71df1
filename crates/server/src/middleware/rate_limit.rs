//! Rate limiting middleware: a fixed-window counter and a slowdown governor.
//!
//! Both policies share one per-IP window (60 s). The counter rejects with
//! `rate_limited` once the mode-dependent ceiling is exceeded; the slowdown
//! only adds a fixed delay after a threshold, discouraging credential
//! probing without breaking legitimate bursts. Responses carry the draft
//! standard `RateLimit-*` headers; the legacy `X-RateLimit-*` family is not
//! sent.
//!
//! Exemptions are computed from the request's original URI, so mounting the
//! governor under a prefix cannot silently break them: all `OPTIONS`
//! requests (preflight), and, in development only, the logical auth route
//! groups.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::sync::Cache;

use crate::config::RuntimeMode;
use crate::error::AppError;
use crate::state::AppState;

/// Window length shared by both policies.
pub const WINDOW_SECONDS: u64 = 60;

/// Logical auth route groups exempt from governing in development. Matched
/// against the original request path, independent of where routers are
/// mounted.
pub const AUTH_ROUTE_GROUPS: &[&str] = &["/auth", "/store-auth"];

/// Per-mode governor settings.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    /// Requests allowed per window before rejection.
    pub max_requests: u32,
    /// Requests allowed per window before the slowdown kicks in.
    pub delay_after: u32,
    /// Fixed delay applied to each request past `delay_after`.
    pub delay: Duration,
}

impl RateLimitSettings {
    /// Settings for a runtime mode. Development gets a far higher ceiling so
    /// iterative testing is not throttled.
    #[must_use]
    pub const fn for_mode(mode: RuntimeMode) -> Self {
        match mode {
            RuntimeMode::Development => Self {
                max_requests: 1000,
                delay_after: 10,
                delay: Duration::from_millis(500),
            },
            RuntimeMode::Production => Self {
                max_requests: 100,
                delay_after: 10,
                delay: Duration::from_millis(500),
            },
        }
    }
}

/// Outcome of governing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not governed: preflight, or an exempt route group in development.
    Exempt,
    /// Within the ceiling; `delay` is set once the slowdown threshold passed.
    Allow {
        limit: u32,
        remaining: u32,
        reset_seconds: u64,
        delay: Option<Duration>,
    },
    /// Ceiling exceeded; reject with `rate_limited`.
    Reject {
        limit: u32,
        retry_after_seconds: u64,
    },
}

/// Shared request-governor state: per-(IP, window) counters.
pub struct RateGovernor {
    mode: RuntimeMode,
    settings: RateLimitSettings,
    windows: Cache<(IpAddr, u64), Arc<AtomicU32>>,
}

impl RateGovernor {
    /// Create a governor for the given runtime mode.
    #[must_use]
    pub fn new(mode: RuntimeMode) -> Self {
        Self {
            mode,
            settings: RateLimitSettings::for_mode(mode),
            windows: Cache::builder()
                .time_to_live(Duration::from_secs(2 * WINDOW_SECONDS))
                .max_capacity(100_000)
                .build(),
        }
    }

    /// Classify one request and record it against its window.
    ///
    /// `original_path` must be the full request path, not one stripped by
    /// router mounting. `now_unix` is injected for testability.
    #[must_use]
    pub fn check(
        &self,
        ip: IpAddr,
        method: &Method,
        original_path: &str,
        now_unix: u64,
    ) -> Decision {
        // Preflight must never be throttled or delayed
        if method == Method::OPTIONS {
            return Decision::Exempt;
        }

        if !self.mode.is_production() && is_auth_group(original_path) {
            return Decision::Exempt;
        }

        let window = now_unix / WINDOW_SECONDS;
        let counter = self
            .windows
            .get_with((ip, window), || Arc::new(AtomicU32::new(0)));
        let count = counter.fetch_add(1, Ordering::Relaxed).saturating_add(1);

        let reset_seconds = (window + 1) * WINDOW_SECONDS - now_unix;
        let limit = self.settings.max_requests;

        if count > limit {
            return Decision::Reject {
                limit,
                retry_after_seconds: reset_seconds,
            };
        }

        Decision::Allow {
            limit,
            remaining: limit - count,
            reset_seconds,
            delay: (count > self.settings.delay_after).then_some(self.settings.delay),
        }
    }
}

/// Whether a path falls under one of the logical auth route groups.
pub fn is_auth_group(path: &str) -> bool {
    let normalized = path.trim_end_matches('/');
    AUTH_ROUTE_GROUPS.iter().any(|group| {
        normalized == *group || path.starts_with(&format!("{group}/"))
    })
}

/// Axum middleware applying the governor to every routed request.
pub async fn govern(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), request.extensions());
    let decision = state
        .governor()
        .check(ip, request.method(), original_uri.path(), unix_now());

    match decision {
        Decision::Exempt => next.run(request).await,
        Decision::Allow {
            limit,
            remaining,
            reset_seconds,
            delay,
        } => {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut response = next.run(request).await;
            set_rate_limit_headers(response.headers_mut(), limit, remaining, reset_seconds);
            response
        }
        Decision::Reject {
            limit,
            retry_after_seconds,
        } => {
            tracing::warn!(%ip, path = original_uri.path(), "rate limit exceeded");
            let mut response = AppError::RateLimited {
                retry_after_seconds,
            }
            .into_response();
            set_rate_limit_headers(response.headers_mut(), limit, 0, retry_after_seconds);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
            response
        }
    }
}

/// Draft standard rate-limit headers.
fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_seconds: u64) {
    headers.insert(
        HeaderName::from_static("ratelimit-limit"),
        HeaderValue::from(limit),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(remaining),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(reset_seconds),
    );
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Resolve the client IP: proxy headers first, then the socket address.
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    // Try X-Forwarded-For (first IP in the chain)
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    // Try X-Real-IP
    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    // Try Fly-Client-IP (Fly.io's header)
    if let Some(ip) = headers
        .get("fly-client-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[test]
    fn test_is_auth_group() {
        assert!(is_auth_group("/auth"));
        assert!(is_auth_group("/auth/"));
        assert!(is_auth_group("/auth/login"));
        assert!(is_auth_group("/store-auth/me"));

        assert!(!is_auth_group("/authx"));
        assert!(!is_auth_group("/store"));
        assert!(!is_auth_group("/store/prices/bulk"));
        assert!(!is_auth_group("/"));
    }

    #[test]
    fn test_options_is_exempt() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        let decision = governor.check(ip(1), &Method::OPTIONS, "/store-auth/login", 0);
        assert_eq!(decision, Decision::Exempt);
    }

    #[test]
    fn test_development_exempts_auth_groups() {
        let governor = RateGovernor::new(RuntimeMode::Development);
        assert_eq!(
            governor.check(ip(1), &Method::POST, "/store-auth/login", 0),
            Decision::Exempt
        );
        // Non-auth paths are still governed in development
        assert!(matches!(
            governor.check(ip(1), &Method::POST, "/store/prices/bulk", 0),
            Decision::Allow { .. }
        ));
    }

    #[test]
    fn test_production_governs_auth_groups() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        assert!(matches!(
            governor.check(ip(1), &Method::POST, "/store-auth/login", 0),
            Decision::Allow { .. }
        ));
    }

    #[test]
    fn test_counter_rejects_past_ceiling() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        let limit = RateLimitSettings::for_mode(RuntimeMode::Production).max_requests;

        for _ in 0..limit {
            assert!(matches!(
                governor.check(ip(2), &Method::POST, "/store-auth/login", 30),
                Decision::Allow { .. }
            ));
        }

        let decision = governor.check(ip(2), &Method::POST, "/store-auth/login", 30);
        assert!(matches!(decision, Decision::Reject { .. }));
        if let Decision::Reject {
            retry_after_seconds,
            ..
        } = decision
        {
            assert_eq!(retry_after_seconds, 30);
        }
    }

    #[test]
    fn test_remaining_counts_down() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        let limit = RateLimitSettings::for_mode(RuntimeMode::Production).max_requests;

        let first = governor.check(ip(3), &Method::POST, "/store-auth/login", 0);
        assert_eq!(
            first,
            Decision::Allow {
                limit,
                remaining: limit - 1,
                reset_seconds: 60,
                delay: None,
            }
        );
    }

    #[test]
    fn test_slowdown_after_threshold() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        let settings = RateLimitSettings::for_mode(RuntimeMode::Production);

        for _ in 0..settings.delay_after {
            let decision = governor.check(ip(4), &Method::POST, "/store-auth/login", 0);
            assert!(matches!(decision, Decision::Allow { delay: None, .. }));
        }

        let decision = governor.check(ip(4), &Method::POST, "/store-auth/login", 0);
        assert!(matches!(
            decision,
            Decision::Allow {
                delay: Some(d),
                ..
            } if d == settings.delay
        ));
    }

    #[test]
    fn test_windows_are_independent_per_ip() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        let limit = RateLimitSettings::for_mode(RuntimeMode::Production).max_requests;

        for _ in 0..=limit {
            governor.check(ip(5), &Method::POST, "/store-auth/login", 0);
        }
        assert!(matches!(
            governor.check(ip(5), &Method::POST, "/store-auth/login", 0),
            Decision::Reject { .. }
        ));

        // A different client is unaffected
        assert!(matches!(
            governor.check(ip(6), &Method::POST, "/store-auth/login", 0),
            Decision::Allow { .. }
        ));
    }

    #[test]
    fn test_new_window_resets_counter() {
        let governor = RateGovernor::new(RuntimeMode::Production);
        let limit = RateLimitSettings::for_mode(RuntimeMode::Production).max_requests;

        for _ in 0..=limit {
            governor.check(ip(7), &Method::POST, "/store-auth/login", 30);
        }
        assert!(matches!(
            governor.check(ip(7), &Method::POST, "/store-auth/login", 59),
            Decision::Reject { .. }
        ));

        // Next 60s window starts fresh
        assert!(matches!(
            governor.check(ip(7), &Method::POST, "/store-auth/login", 60),
            Decision::Allow { .. }
        ));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );
        let extensions = Extensions::new();

        assert_eq!(
            client_ip(&headers, &extensions),
            "198.51.100.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_client_ip_falls_back_to_unspecified() {
        let headers = HeaderMap::new();
        let extensions = Extensions::new();
        assert_eq!(
            client_ip(&headers, &extensions),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }
}
