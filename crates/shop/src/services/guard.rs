//! Authorization guard.
//!
//! A [`Policy`] names the permissions that unlock an action and, optionally,
//! the user who owns the resource. A caller passes if they hold any listed
//! permission OR own the resource. A policy with neither only requires a
//! signed-in caller.
//!
//! Evaluation is pure: the caller's permissions are loaded before the guard
//! runs.

use sick_fits_core::{Permission, UserId};

use crate::context::Caller;
use crate::error::ShopError;

/// Why a caller was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No caller identity.
    Unauthenticated,
    /// Signed in, but neither owner nor holder of a required permission.
    Forbidden,
}

/// Outcome of evaluating a [`Policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    /// Whether the caller may proceed.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert into the shop error contract.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Unauthenticated` or `ShopError::Forbidden` on deny.
    pub const fn into_result(self) -> Result<(), ShopError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::Unauthenticated) => Err(ShopError::Unauthenticated),
            Self::Deny(DenyReason::Forbidden) => Err(ShopError::Forbidden),
        }
    }
}

/// What an action requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy<'a> {
    permissions: &'a [Permission],
    owner: Option<UserId>,
}

impl<'a> Policy<'a> {
    /// Any signed-in caller.
    #[must_use]
    pub const fn signed_in() -> Self {
        Self {
            permissions: &[],
            owner: None,
        }
    }

    /// Callers holding at least one of `permissions`.
    #[must_use]
    pub const fn any_of(permissions: &'a [Permission]) -> Self {
        Self {
            permissions,
            owner: None,
        }
    }

    /// Only the owner of the resource.
    #[must_use]
    pub const fn owned_by(owner: UserId) -> Self {
        Self {
            permissions: &[],
            owner: Some(owner),
        }
    }

    /// Also allow the resource owner.
    #[must_use]
    pub const fn or_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Decide for `caller`.
    #[must_use]
    pub fn evaluate(&self, caller: Option<&Caller>) -> Decision {
        let Some(caller) = caller else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };

        if self.permissions.is_empty() && self.owner.is_none() {
            return Decision::Allow;
        }

        let owns = self.owner.is_some_and(|owner| owner == caller.user_id);
        if owns || caller.permissions.contains_any(self.permissions) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::Forbidden)
        }
    }

    /// Evaluate and convert to a result.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Unauthenticated` or `ShopError::Forbidden`.
    pub fn authorize(&self, caller: Option<&Caller>) -> Result<(), ShopError> {
        self.evaluate(caller).into_result()
    }
}

/// Require a signed-in caller and return it.
///
/// # Errors
///
/// Returns `ShopError::Unauthenticated` without a caller.
pub fn require_caller(caller: Option<&Caller>) -> Result<&Caller, ShopError> {
    caller.ok_or(ShopError::Unauthenticated)
}
