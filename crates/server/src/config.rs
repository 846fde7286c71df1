//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SCREENFIX_DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Required in production
//! - `SCREENFIX_OWNER_USERNAME` - Owner login name
//! - `SCREENFIX_OWNER_PASSWORD` - Owner password (min 10 chars, not a common password)
//! - `SCREENFIX_JWT_SECRET` - Owner-token signing secret (min 32 chars, high entropy)
//! - `SCREENFIX_ALLOWED_ORIGINS` - Comma-separated exact origins for CORS
//!
//! ## Optional
//! - `SCREENFIX_ENV` - `development` (default) or `production`
//! - `SCREENFIX_HOST` - Bind address (default: 127.0.0.1)
//! - `SCREENFIX_PORT` - Listen port (default: 4000)
//! - `SCREENFIX_WEBHOOK_SECRET` - Webhook HMAC key; verification reports
//!   "not configured" when absent
//! - `SCREENFIX_WEBHOOK_ENABLED` - Mount the webhook receiver outside development
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_OWNER_PASSWORD_LENGTH: usize = 10;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Blocklist of widely used passwords the owner credential must not match.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "123456789012",
    "qwertyuiop",
    "letmein123",
    "admin12345",
    "welcome123",
    "iloveyou12",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Runtime mode, driving the origin policy, rate ceilings and cookie flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    /// Parse the mode from its environment representation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for anything other than
    /// `development` or `production`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::InvalidEnvVar(
                "SCREENFIX_ENV".to_string(),
                format!("expected 'development' or 'production', got '{other}'"),
            )),
        }
    }

    /// Whether the server runs in production mode.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// The single owner/admin operator credential.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct OwnerCredentials {
    /// Owner login name
    pub username: String,
    /// Owner password, compared verbatim at login (single shared operator
    /// credential, not a multi-user store)
    pub password: SecretString,
}

impl std::fmt::Debug for OwnerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Screenfix server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Runtime mode
    pub mode: RuntimeMode,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Owner credential; owner login responds `not_configured` when absent
    pub owner: Option<OwnerCredentials>,
    /// Owner-token signing secret
    pub jwt_secret: Option<SecretString>,
    /// Webhook HMAC key; verification reports `null` when absent
    pub webhook_secret: Option<SecretString>,
    /// Exact origins allowed cross-origin access
    pub allowed_origins: Vec<String>,
    /// Whether the webhook receiver is mounted outside development
    pub webhook_enabled: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the production self-check fails (weak/missing secrets, empty origin
    /// allow-list).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mode = RuntimeMode::parse(&get_env_or_default("SCREENFIX_ENV", "development"))?;
        let database_url = get_database_url("SCREENFIX_DATABASE_URL")?;
        let host = get_env_or_default("SCREENFIX_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SCREENFIX_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SCREENFIX_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SCREENFIX_PORT".to_string(), e.to_string()))?;

        let owner = match (
            get_optional_env("SCREENFIX_OWNER_USERNAME"),
            get_optional_env("SCREENFIX_OWNER_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(OwnerCredentials {
                username,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        let jwt_secret = get_optional_env("SCREENFIX_JWT_SECRET").map(SecretString::from);
        let webhook_secret = get_optional_env("SCREENFIX_WEBHOOK_SECRET").map(SecretString::from);
        let allowed_origins = parse_origin_list(&get_env_or_default("SCREENFIX_ALLOWED_ORIGINS", ""));
        let webhook_enabled = get_env_or_default("SCREENFIX_WEBHOOK_ENABLED", "false") == "true";
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        let config = Self {
            mode,
            database_url,
            host,
            port,
            owner,
            jwt_secret,
            webhook_secret,
            allowed_origins,
            webhook_enabled,
            sentry_dsn,
        };
        config.validate()?;
        Ok(config)
    }

    /// Startup self-check.
    ///
    /// Development accepts partial configuration (missing owner credential or
    /// signing secret degrades the owner endpoints to `not_configured`).
    /// Production refuses to start with missing or weak secrets or an empty
    /// origin allow-list, so the process fails closed by construction.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first failed check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mode.is_production() {
            return Ok(());
        }

        let Some(owner) = &self.owner else {
            return Err(ConfigError::MissingEnvVar(
                "SCREENFIX_OWNER_USERNAME/SCREENFIX_OWNER_PASSWORD".to_string(),
            ));
        };
        validate_owner_password(owner.password.expose_secret(), "SCREENFIX_OWNER_PASSWORD")?;

        let Some(jwt_secret) = &self.jwt_secret else {
            return Err(ConfigError::MissingEnvVar("SCREENFIX_JWT_SECRET".to_string()));
        };
        validate_signing_secret(jwt_secret.expose_secret(), "SCREENFIX_JWT_SECRET")?;

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "SCREENFIX_ALLOWED_ORIGINS".to_string(),
                "must list at least one origin in production".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Split a comma-separated origin list, dropping empty entries.
fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Validate the token-signing secret: minimum length plus strength.
fn validate_signing_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    validate_secret_strength(secret, var_name)
}

/// Validate the owner password: minimum length and not a common password.
fn validate_owner_password(password: &str, var_name: &str) -> Result<(), ConfigError> {
    if password.len() < MIN_OWNER_PASSWORD_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_OWNER_PASSWORD_LENGTH,
                password.len()
            ),
        ));
    }

    let lower = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lower.as_str()) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "matches a common-password blocklist entry".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base_config(mode: RuntimeMode) -> ServerConfig {
        ServerConfig {
            mode,
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            owner: Some(OwnerCredentials {
                username: "owner".to_string(),
                password: SecretString::from("kY7#vQ2pL!xW9z"),
            }),
            jwt_secret: Some(SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6dE8")),
            webhook_secret: None,
            allowed_origins: vec!["https://booking.screenfix.example".to_string()],
            webhook_enabled: false,
            sentry_dsn: None,
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(
            RuntimeMode::parse("development").unwrap(),
            RuntimeMode::Development
        );
        assert_eq!(
            RuntimeMode::parse("production").unwrap(),
            RuntimeMode::Production
        );
        assert!(RuntimeMode::parse("staging").is_err());
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_signing_secret_too_short() {
        let result = validate_signing_secret("short", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_signing_secret_valid() {
        let result = validate_signing_secret("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6dE8", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_owner_password_too_short() {
        let result = validate_owner_password("short", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_owner_password_common() {
        let result = validate_owner_password("Password123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_owner_password_valid() {
        let result = validate_owner_password("kY7#vQ2pL!xW9z", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_origin_list() {
        let origins =
            parse_origin_list(" https://a.example , https://b.example/ ,, https://c.example");
        assert_eq!(
            origins,
            vec![
                "https://a.example".to_string(),
                "https://b.example".to_string(),
                "https://c.example".to_string(),
            ]
        );
        assert!(parse_origin_list("").is_empty());
    }

    #[test]
    fn test_validate_development_accepts_partial_config() {
        let config = ServerConfig {
            owner: None,
            jwt_secret: None,
            allowed_origins: Vec::new(),
            ..base_config(RuntimeMode::Development)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_production_requires_owner() {
        let config = ServerConfig {
            owner: None,
            ..base_config(RuntimeMode::Production)
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_validate_production_rejects_weak_owner_password() {
        let config = ServerConfig {
            owner: Some(OwnerCredentials {
                username: "owner".to_string(),
                password: SecretString::from("letmein123"),
            }),
            ..base_config(RuntimeMode::Production)
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_validate_production_requires_origins() {
        let config = ServerConfig {
            allowed_origins: Vec::new(),
            ..base_config(RuntimeMode::Production)
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_validate_production_ok() {
        assert!(base_config(RuntimeMode::Production).validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = base_config(RuntimeMode::Development);
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_owner_credentials_debug_redacts_password() {
        let owner = OwnerCredentials {
            username: "owner".to_string(),
            password: SecretString::from("super_secret_password_value"),
        };

        let debug_output = format!("{owner:?}");
        assert!(debug_output.contains("owner"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_value"));
    }
}
