//! Credential error types.

use thiserror::Error;

/// Errors from hashing passwords and signing tokens.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Password hashing failed.
    #[error("password hashing error")]
    PasswordHash,

    /// Password does not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session token is malformed or its signature does not verify.
    #[error("invalid session token")]
    InvalidToken,

    /// Session token could not be signed.
    #[error("token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}
