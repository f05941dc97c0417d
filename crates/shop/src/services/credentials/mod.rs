//! Passwords, session tokens and password reset tokens.
//!
//! - Passwords are hashed with Argon2id at the crate's default parameters.
//! - Session tokens are HS256 JWTs carrying `userId` and `iat`. They have no
//!   `exp` claim; the one-year cookie max-age is their only lifetime.
//! - Reset tokens are 20 random bytes, hex encoded, valid for one hour and
//!   cleared from the user row when used.

mod error;

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use sick_fits_core::UserId;

pub use error::CredentialError;

use crate::error::ValidationError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "token";

/// Session cookie lifetime.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Random bytes in a reset token.
pub const RESET_TOKEN_BYTES: usize = 20;

/// How long a reset token stays valid.
pub const RESET_TOKEN_TTL: chrono::Duration = chrono::Duration::hours(1);

/// Check password strength.
///
/// # Errors
///
/// Returns `ValidationError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `CredentialError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| CredentialError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `CredentialError::InvalidCredentials` if the password does not
/// match or the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<(), CredentialError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| CredentialError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| CredentialError::InvalidCredentials)
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(rename = "userId")]
    user_id: UserId,
    iat: i64,
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    /// Derive keys from the app secret.
    #[must_use]
    pub fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Sign a session token for a user.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Signing` if encoding fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, CredentialError> {
        let claims = SessionClaims {
            user_id,
            iat: Utc::now().timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify a session token and return its user.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidToken` if the token is malformed or
    /// was signed with another key.
    pub fn verify(&self, token: &str) -> Result<UserId, CredentialError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.user_id)
            .map_err(|_| CredentialError::InvalidToken)
    }
}

/// The session cookie a transport should set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: &'static str,
    /// Signed session token, empty when clearing.
    pub value: String,
    pub http_only: bool,
    /// Zero tells the client to drop the cookie.
    pub max_age: Duration,
}

impl SessionCookie {
    /// Cookie carrying a freshly issued session token.
    #[must_use]
    pub const fn for_token(token: String) -> Self {
        Self {
            name: SESSION_COOKIE_NAME,
            value: token,
            http_only: true,
            max_age: SESSION_MAX_AGE,
        }
    }

    /// Cookie that removes the session on signout.
    #[must_use]
    pub const fn cleared() -> Self {
        Self {
            name: SESSION_COOKIE_NAME,
            value: String::new(),
            http_only: true,
            max_age: Duration::ZERO,
        }
    }
}

/// A password reset token and when it stops working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a reset token valid for [`RESET_TOKEN_TTL`] from `now`.
#[must_use]
pub fn issue_reset_token(now: DateTime<Utc>) -> ResetToken {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);

    ResetToken {
        token: hex::encode(bytes),
        expires_at: now + RESET_TOKEN_TTL,
    }
}
