//! Token codec: signs and verifies bearer tokens.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rolegate_core::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AuthError;

/// Token verification failures.
///
/// Only logged; callers of the authentication gate see `Unauthenticated`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Expiry has elapsed.
    #[error("token expired")]
    Expired,

    /// Signature does not match the server secret.
    #[error("invalid signature")]
    InvalidSignature,

    /// Not a decodable token.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signing failed.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID).
    pub sub: String,
    /// Role names held by the account when the token was issued.
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Parse the subject back into an account id.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the subject is not numeric.
    pub fn account_id(&self) -> Result<AccountId, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::Malformed(format!("non-numeric subject {:?}", self.sub)))
    }
}

/// A freshly signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded token.
    pub token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 tokens with a process-wide secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec with a secret key.
    ///
    /// The secret should be at least 32 bytes.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Create a codec from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails or the secret is empty.
    pub fn from_hex_secret(hex_secret: &str, ttl: Duration) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret)
            .map_err(|e| AuthError::Config(format!("Invalid hex secret: {e}")))?;
        if secret.is_empty() {
            return Err(AuthError::Config("Signing secret is empty".to_string()));
        }
        Ok(Self::new(&secret, ttl))
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a claim set.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if serialization or signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Build and sign claims for an account, expiring one TTL from now.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if signing fails.
    pub fn issue(&self, account_id: AccountId, roles: Vec<String>) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| TokenError::Encoding(format!("TTL out of range: {e}")))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Encoding("TTL overflows the expiry timestamp".to_string()))?;

        let claims = Claims {
            sub: account_id.to_string(),
            roles,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    /// Verify signature and expiry, then decode the claims.
    ///
    /// # Errors
    ///
    /// Returns the failure subtype; see [`TokenError`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
