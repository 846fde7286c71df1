//! HTTP middleware stack for the booking service.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. CORS (origin policy engine; answers preflight before anything else)
//! 3. `TraceLayer` (request tracing)
//! 4. Rate governor (counter + slowdown, mounted on the auth route groups)
//! 5. Route guards (`RequireOwner` / `RequireStoreUser` extractors)

pub mod auth;
pub mod origin;
pub mod rate_limit;

pub use auth::{RequireOwner, RequireStoreUser, cookie_value};
pub use origin::{OriginPolicy, cors_layer};
pub use rate_limit::{RateGovernor, RateLimitSettings};
