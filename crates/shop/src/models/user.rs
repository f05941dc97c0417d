//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sick_fits_core::{Email, PermissionSet, UserId};

/// A shop account.
///
/// The password hash and reset token never leave the store; see
/// [`crate::db::UserStore::get_password_hash`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email, lowercase.
    pub email: Email,
    /// Granted permissions.
    pub permissions: PermissionSet,
    /// When the user signed up.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub permissions: PermissionSet,
}
