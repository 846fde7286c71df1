//! Cross-origin policy engine.
//!
//! Decides per request whether a declared origin may receive CORS headers.
//! Production allows exactly the configured allow-list; development
//! additionally allows loopback and private-LAN origins so local frontends
//! work without configuration. Requests without an `Origin` header (same
//! origin, curl, server-to-server) are unaffected by CORS entirely.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, header, request::Parts};
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::Url;

use crate::config::RuntimeMode;
use crate::services::webhook;

/// Origin classification policy for one runtime mode.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    mode: RuntimeMode,
    allow_list: Vec<String>,
}

impl OriginPolicy {
    /// Create a policy from the configured allow-list.
    ///
    /// Config validation has already refused to start production with an
    /// empty list, so production is fail-closed by construction.
    #[must_use]
    pub const fn new(mode: RuntimeMode, allow_list: Vec<String>) -> Self {
        Self { mode, allow_list }
    }

    /// Whether a declared origin may receive CORS headers.
    ///
    /// Malformed origins are denied: parse failure is never an allow.
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        if self.allow_list.iter().any(|allowed| allowed == origin) {
            return true;
        }

        if self.mode.is_production() {
            return false;
        }

        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        is_loopback_host(host) || is_private_lan_host(host)
    }
}

/// Hostnames that count as local development.
fn is_loopback_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0")
}

/// Private IPv4 ranges: 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16.
fn is_private_lan_host(host: &str) -> bool {
    let Ok(addr) = host.parse::<Ipv4Addr>() else {
        return false;
    };

    match addr.octets() {
        [10, ..] => true,
        // The /12 covers second octets 16 through 31 only
        [172, second, ..] => (16..=31).contains(&second),
        [192, 168, ..] => true,
        _ => false,
    }
}

/// Build the CORS layer from the origin policy.
///
/// Layered outermost (before the rate governor) so preflight `OPTIONS`
/// requests are answered without ever being throttled or delayed.
#[must_use]
pub fn cors_layer(policy: OriginPolicy) -> CorsLayer {
    let policy = Arc::new(policy);

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin.to_str().is_ok_and(|origin| policy.allows(origin))
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(webhook::SIGNATURE_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
