//! Authentication value objects

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::AuthError;

/// Username value object with validation
///
/// The username doubles as the caller identity the rate limiter keys
/// buckets by, so it is validated once here and treated as opaque after.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    const MAX_LENGTH: usize = 64;

    /// Create a new Username with validation
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthError> {
        let username = raw.into().trim().to_string();

        if username.is_empty() {
            return Err(AuthError::InvalidUsername {
                reason: "username cannot be empty".to_string(),
            });
        }

        if username.len() > Self::MAX_LENGTH {
            return Err(AuthError::InvalidUsername {
                reason: format!("username cannot exceed {} characters", Self::MAX_LENGTH),
            });
        }

        Ok(Self(username))
    }

    /// Get the username as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hashed password in PHC string format (never expose the raw hash)
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Get the PHC-format hash string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PasswordHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordHash(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_trims_whitespace() {
        let username = Username::new("  alice  ").unwrap();
        assert_eq!(username.as_str(), "alice");
    }

    #[test]
    fn test_username_rejects_empty() {
        assert!(Username::new("").is_err());
        assert!(Username::new("   ").is_err());
    }

    #[test]
    fn test_username_rejects_oversized() {
        assert!(Username::new("a".repeat(65)).is_err());
        assert!(Username::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn test_password_hash_debug_is_redacted() {
        let hash = PasswordHash::from("$argon2id$v=19$secret".to_string());
        assert_eq!(format!("{:?}", hash), "PasswordHash(<redacted>)");
    }
}
