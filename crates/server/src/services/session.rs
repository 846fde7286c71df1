//! Session lifecycle for the two credential schemes.
//!
//! Both schemes implement [`SessionProvider`]: the owner scheme issues
//! stateless signed tokens (its `revoke` is an explicit no-op), the store
//! scheme issues server-side session rows that are individually revocable.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use screenfix_core::Username;

use crate::config::ServerConfig;
use crate::db::{SessionRepository, StoreUserRepository};
use crate::models::{OwnerPrincipal, StoreContext};
use crate::services::auth::{self, AuthError};

/// Cookie carrying the owner's signed token.
pub const OWNER_COOKIE: &str = "sf_owner";

/// Cookie carrying the opaque store-session ID.
pub const STORE_COOKIE: &str = "sf_store";

/// Owner tokens stay valid for 7 days.
pub const OWNER_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Store sessions last one shift.
pub const STORE_SESSION_TTL_SECONDS: i64 = 8 * 60 * 60;

/// The subject claim every owner token carries.
const OWNER_SUBJECT: &str = "owner";

/// A freshly issued credential: the raw cookie value and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Username/password pair submitted to a login endpoint.
///
/// Carries the raw password, so it implements neither `Debug` nor `Clone`.
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
}

/// Common lifecycle of a credential scheme.
///
/// `issue` turns a login attempt into a credential, `validate` turns a raw
/// cookie value into a typed principal, `revoke` invalidates a credential
/// where the scheme supports it.
#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    /// The per-request identity this scheme authenticates.
    type Principal;

    /// Verify a login attempt and issue a credential.
    async fn issue(&self, login: LoginAttempt) -> Result<IssuedCredential, AuthError>;

    /// Verify a raw credential and produce the principal it authorizes.
    async fn validate(&self, raw: &str) -> Result<Self::Principal, AuthError>;

    /// Invalidate a credential. Idempotent.
    async fn revoke(&self, raw: &str) -> Result<(), AuthError>;
}

// =============================================================================
// Owner scheme (stateless)
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct OwnerClaims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// Stateless owner sessions: an HS256-signed token verified by signature and
/// expiry alone, with no server-side record.
pub struct OwnerSessions<'a> {
    config: &'a ServerConfig,
}

impl<'a> OwnerSessions<'a> {
    /// Create the owner session provider.
    #[must_use]
    pub const fn new(config: &'a ServerConfig) -> Self {
        Self { config }
    }

    fn signing_secret(&self) -> Result<&str, AuthError> {
        self.config
            .jwt_secret
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .ok_or(AuthError::NotConfigured)
    }
}

impl SessionProvider for OwnerSessions<'_> {
    type Principal = OwnerPrincipal;

    async fn issue(&self, login: LoginAttempt) -> Result<IssuedCredential, AuthError> {
        let Some(owner) = &self.config.owner else {
            return Err(AuthError::NotConfigured);
        };
        let secret = self.signing_secret()?;

        // Single shared operator credential: compared verbatim, and both
        // fields checked so failures stay uniform.
        let username_ok = login.username == owner.username;
        let password_ok = login.password == owner.password.expose_secret();
        if !(username_ok && password_ok) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let expires_at = now + Duration::seconds(OWNER_TOKEN_TTL_SECONDS);
        let claims = OwnerClaims {
            sub: OWNER_SUBJECT.to_string(),
            username: owner.username.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|_| AuthError::SessionInvalid)?;

        Ok(IssuedCredential {
            value: token,
            expires_at,
        })
    }

    async fn validate(&self, raw: &str) -> Result<Self::Principal, AuthError> {
        let secret = self.signing_secret()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<OwnerClaims>(
            raw,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::SessionInvalid)?;

        if data.claims.sub != OWNER_SUBJECT {
            return Err(AuthError::SessionInvalid);
        }

        Ok(OwnerPrincipal {
            subject: data.claims.sub,
            username: data.claims.username,
        })
    }

    /// No-op: the token is stateless, so nothing server-side can be
    /// invalidated. Logout clears the cookie only; a copy of an unexpired
    /// token replayed elsewhere remains valid until `exp`.
    async fn revoke(&self, _raw: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

// =============================================================================
// Store scheme (stateful)
// =============================================================================

/// Stateful store sessions: one `store_session` row per login, validated by
/// lookup and revocable by deletion.
pub struct StoreSessions<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreSessions<'a> {
    /// Create the store session provider.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl SessionProvider for StoreSessions<'_> {
    type Principal = StoreContext;

    async fn issue(&self, login: LoginAttempt) -> Result<IssuedCredential, AuthError> {
        // A malformed username can never match a stored account; fail the
        // same way a wrong password does.
        let username =
            Username::parse(&login.username).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = StoreUserRepository::new(self.pool)
            .get_with_hash(&username)
            .await?
        else {
            return Err(AuthError::InvalidCredentials);
        };

        if !user.active {
            return Err(AuthError::InvalidCredentials);
        }

        // Argon2 verification is CPU-bound; keep it off the async workers.
        let password = login.password;
        tokio::task::spawn_blocking(move || auth::verify_password(&password, &password_hash))
            .await
            .map_err(|_| AuthError::PasswordHash)??;

        let session = SessionRepository::new(self.pool)
            .create(user.id, Duration::seconds(STORE_SESSION_TTL_SECONDS))
            .await?;

        Ok(IssuedCredential {
            value: session.id.to_string(),
            expires_at: session.expires_at,
        })
    }

    async fn validate(&self, raw: &str) -> Result<Self::Principal, AuthError> {
        let id = Uuid::parse_str(raw).map_err(|_| AuthError::SessionInvalid)?;

        SessionRepository::new(self.pool)
            .find_context(id)
            .await?
            .ok_or(AuthError::SessionInvalid)
    }

    /// True revocation: deletes the session row. Unknown or malformed IDs are
    /// ignored so a second logout is a no-op rather than an error.
    async fn revoke(&self, raw: &str) -> Result<(), AuthError> {
        let Ok(id) = Uuid::parse_str(raw) else {
            return Ok(());
        };

        SessionRepository::new(self.pool).delete(id).await?;
        Ok(())
    }
}

// =============================================================================
// Cookies
// =============================================================================

/// Build a session cookie with the hardening attributes both schemes share.
#[must_use]
pub fn build_cookie(name: &str, value: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie =
        format!("{name}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build an expired cookie that clears `name` on the client.
#[must_use]
pub fn clear_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", 0, secure)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{OwnerCredentials, RuntimeMode};
    use secrecy::SecretString;

    fn owner_config() -> ServerConfig {
        ServerConfig {
            mode: RuntimeMode::Development,
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            owner: Some(OwnerCredentials {
                username: "owner".to_string(),
                password: SecretString::from("kY7#vQ2pL!xW9z"),
            }),
            jwt_secret: Some(SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6dE8")),
            webhook_secret: None,
            allowed_origins: Vec::new(),
            webhook_enabled: false,
            sentry_dsn: None,
        }
    }

    fn login(username: &str, password: &str) -> LoginAttempt {
        LoginAttempt {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_owner_issue_validate_roundtrip() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);

        let issued = sessions
            .issue(login("owner", "kY7#vQ2pL!xW9z"))
            .await
            .unwrap();
        assert!(issued.expires_at > Utc::now());

        let principal = sessions.validate(&issued.value).await.unwrap();
        assert_eq!(principal.subject, "owner");
        assert_eq!(principal.username, "owner");
    }

    #[tokio::test]
    async fn test_owner_issue_rejects_wrong_credentials() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);

        for (username, password) in [
            ("owner", "wrong-password"),
            ("not-owner", "kY7#vQ2pL!xW9z"),
            ("not-owner", "wrong-password"),
        ] {
            let result = sessions.issue(login(username, password)).await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn test_owner_issue_unconfigured() {
        let config = ServerConfig {
            owner: None,
            ..owner_config()
        };
        let sessions = OwnerSessions::new(&config);

        let result = sessions.issue(login("owner", "kY7#vQ2pL!xW9z")).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_owner_validate_rejects_garbage() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);

        assert!(matches!(
            sessions.validate("not-a-token").await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_owner_validate_rejects_tampered_token() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);

        let issued = sessions
            .issue(login("owner", "kY7#vQ2pL!xW9z"))
            .await
            .unwrap();
        let mut tampered = issued.value;
        tampered.pop();
        tampered.push('A');

        assert!(matches!(
            sessions.validate(&tampered).await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_owner_validate_rejects_expired_token() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);
        let secret = config.jwt_secret.as_ref().unwrap().expose_secret();

        let now = Utc::now();
        let claims = OwnerClaims {
            sub: OWNER_SUBJECT.to_string(),
            username: "owner".to_string(),
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            sessions.validate(&token).await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_owner_validate_rejects_wrong_subject() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);
        let secret = config.jwt_secret.as_ref().unwrap().expose_secret();

        let now = Utc::now();
        let claims = OwnerClaims {
            sub: "store".to_string(),
            username: "owner".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            sessions.validate(&token).await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_owner_revoke_is_noop() {
        let config = owner_config();
        let sessions = OwnerSessions::new(&config);

        let issued = sessions
            .issue(login("owner", "kY7#vQ2pL!xW9z"))
            .await
            .unwrap();
        sessions.revoke(&issued.value).await.unwrap();

        // The token still validates: stateless revoke cannot invalidate it.
        assert!(sessions.validate(&issued.value).await.is_ok());
    }

    #[test]
    fn test_build_cookie_attributes() {
        let cookie = build_cookie(OWNER_COOKIE, "token", 3600, false);
        assert!(cookie.starts_with("sf_owner=token; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));

        let secure = build_cookie(STORE_COOKIE, "abc", 60, true);
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_cookie(STORE_COOKIE, false);
        assert!(cookie.starts_with("sf_store=; "));
        assert!(cookie.contains("Max-Age=0"));
    }
}
