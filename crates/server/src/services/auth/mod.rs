//! Credential verification primitives.
//!
//! Argon2id hashing and verification shared by store login. Hashing is
//! CPU-bound; callers on the async runtime should wrap verification in
//! `tokio::task::spawn_blocking` (the session service does).

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a password using Argon2id.
///
/// Used by provisioning tooling when creating store accounts; the server
/// itself only verifies.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the hash does not parse or the
/// password does not match.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("Sup3r$ecret!").unwrap();
        assert!(verify_password("Sup3r$ecret!", &hash).is_ok());
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("Sup3r$ecret!").unwrap();
        assert!(matches!(
            verify_password("wrong-password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
