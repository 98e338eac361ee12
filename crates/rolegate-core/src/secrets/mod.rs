//! Secret wrappers.
//!
//! - `Password`: plaintext password that never reaches logs
//! - `scrub_secrets`: redact token-shaped strings from messages

use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Deserializer};

/// Plaintext password wrapper that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it is zeroed on
/// drop and never printed by `Debug` or `Display`.
pub struct Password(SecretBox<str>);

impl Password {
    /// Wrap a plaintext password.
    #[must_use]
    pub fn new(password: String) -> Self {
        Self(SecretBox::new(password.into_boxed_str()))
    }

    /// Expose the plaintext for hashing or verification.
    ///
    /// Use sparingly - only at the hasher boundary.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Length in characters.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.expose().chars().count()
    }
}

impl Clone for Password {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Password([REDACTED])")
    }
}

impl std::fmt::Display for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact bearer tokens and argon2 hashes from a message before logging.
#[must_use]
pub fn scrub_secrets(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            if word.starts_with("$argon2") || looks_like_jwt(word) {
                "[REDACTED]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_jwt(word: &str) -> bool {
    word.starts_with("eyJ") && word.matches('.').count() == 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_redacted() {
        let password = Password::new("Str0ngPass".to_string());
        assert_eq!(format!("{password:?}"), "Password([REDACTED])");
        assert_eq!(format!("{password}"), "[REDACTED]");
        assert_eq!(password.expose(), "Str0ngPass");
        assert_eq!(password.char_count(), 10);
    }

    #[test]
    fn test_password_deserialize() {
        let password: Password = serde_json::from_str("\"hunter22\"").unwrap();
        assert_eq!(password.expose(), "hunter22");
    }

    #[test]
    fn test_scrub_secrets() {
        let text = "stored $argon2id$v=19$m=19456,t=2,p=1$abc$def for user";
        assert_eq!(scrub_secrets(text), "stored [REDACTED] for user");

        let text = "token eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig rejected";
        assert_eq!(scrub_secrets(text), "token [REDACTED] rejected");

        assert_eq!(scrub_secrets("nothing here"), "nothing here");
    }
}
