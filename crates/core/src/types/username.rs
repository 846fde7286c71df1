//! Store-account username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum UsernameError {
    /// The input string is empty after trimming.
    #[error("username cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace or control characters.
    #[error("username must not contain whitespace")]
    InvalidCharacter,
}

/// A normalized store-account username.
///
/// Store usernames are matched case-insensitively, so this type normalizes
/// to lowercase at the boundary. Login input of any casing compares equal to
/// the stored form.
///
/// ## Constraints
///
/// - Length: 1-64 characters after trimming
/// - No interior whitespace or control characters
/// - Stored and compared in lowercase
///
/// ## Examples
///
/// ```
/// use screenfix_core::Username;
///
/// let username = Username::parse("Tech1").unwrap();
/// assert_eq!(username.as_str(), "tech1");
///
/// assert!(Username::parse("").is_err());
/// assert!(Username::parse("two words").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Maximum length of a username.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Username` from a string, trimming and lowercasing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty after trimming
    /// - Is longer than 64 characters
    /// - Contains whitespace or control characters
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(UsernameError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(UsernameError::InvalidCharacter);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the normalized username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Username` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Username {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Username {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed normalized
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Username {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_usernames() {
        assert!(Username::parse("tech1").is_ok());
        assert!(Username::parse("store-04").is_ok());
        assert!(Username::parse("front.desk").is_ok());
        assert!(Username::parse("a").is_ok());
    }

    #[test]
    fn test_parse_lowercases() {
        let username = Username::parse("Tech1").unwrap();
        assert_eq!(username.as_str(), "tech1");

        let username = Username::parse("FRONT-DESK").unwrap();
        assert_eq!(username.as_str(), "front-desk");
    }

    #[test]
    fn test_parse_trims() {
        let username = Username::parse("  tech1  ").unwrap();
        assert_eq!(username.as_str(), "tech1");
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Username::parse(""), Err(UsernameError::Empty)));
        assert!(matches!(Username::parse("   "), Err(UsernameError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(65);
        assert!(matches!(
            Username::parse(&long),
            Err(UsernameError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_interior_whitespace() {
        assert!(matches!(
            Username::parse("two words"),
            Err(UsernameError::InvalidCharacter)
        ));
        assert!(matches!(
            Username::parse("tab\tchar"),
            Err(UsernameError::InvalidCharacter)
        ));
    }

    #[test]
    fn test_display() {
        let username = Username::parse("Tech1").unwrap();
        assert_eq!(format!("{username}"), "tech1");
    }

    #[test]
    fn test_serde_roundtrip() {
        let username = Username::parse("tech1").unwrap();
        let json = serde_json::to_string(&username).unwrap();
        assert_eq!(json, "\"tech1\"");

        let parsed: Username = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, username);
    }

    #[test]
    fn test_from_str() {
        let username: Username = "Tech1".parse().unwrap();
        assert_eq!(username.as_str(), "tech1");
    }
}
