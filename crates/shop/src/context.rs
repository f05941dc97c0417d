//! Request caller identity.

use sick_fits_core::{PermissionSet, UserId};

use crate::models::User;

/// The signed-in user behind a request, with permissions as loaded from the
/// store when the request began.
///
/// Built by [`crate::Shop::resolve_caller`] from the session token. Requests
/// without a valid token have no caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub permissions: PermissionSet,
}

impl Caller {
    #[must_use]
    pub const fn new(user_id: UserId, permissions: PermissionSet) -> Self {
        Self {
            user_id,
            permissions,
        }
    }

    /// Caller for a loaded user.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self::new(user.id, user.permissions.clone())
    }
}
