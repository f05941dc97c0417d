//! Signup, signin, password reset and permission administration.

use chrono::Utc;
use tracing::instrument;

use sick_fits_core::{Email, Permission, PermissionSet, UserId};

use super::credentials::{
    self, SessionCookie, hash_password, issue_reset_token, validate_password, verify_password,
};
use super::guard::{Policy, require_caller};
use crate::context::Caller;
use crate::db::RepositoryError;
use crate::error::{
    Result, ShopError, ValidationError, add_breadcrumb, clear_sentry_user, set_sentry_user,
};
use crate::mail::password_reset_message;
use crate::models::{NewUser, User};
use crate::state::Shop;

/// Permissions that allow managing other users.
const USER_ADMIN: &[Permission] = &[Permission::Admin, Permission::PermissionUpdate];

/// A signed-in user and the cookie carrying their session.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
    pub cookie: SessionCookie,
}

/// Result of signing out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOut {
    pub message: &'static str,
    pub cookie: SessionCookie,
}

/// A plain acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessMessage {
    pub message: &'static str,
}

/// Account operations.
pub struct AccountService<'a> {
    shop: &'a Shop,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    fn sign_in(&self, user: User) -> Result<SignedIn> {
        let token = self.shop.sessions().issue(user.id)?;
        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(SignedIn {
            cookie: SessionCookie::for_token(token.clone()),
            token,
            user,
        })
    }

    /// Create an account with the `USER` permission and sign it in.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` for a malformed email, a weak password or an email
    /// that is already registered.
    #[instrument(skip(self, name, password))]
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<SignedIn> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .shop
            .store()
            .create_user(NewUser {
                name: name.trim().to_string(),
                email,
                password_hash,
                permissions: PermissionSet::signup_default(),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => ShopError::from(ValidationError::EmailTaken),
                other => ShopError::from(other),
            })?;

        tracing::info!(user_id = %user.id, "User signed up");
        self.sign_in(user)
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` for an unknown email or a wrong password alike.
    #[instrument(skip(self, password))]
    pub async fn signin(&self, email: &str, password: &str) -> Result<SignedIn> {
        let Ok(email) = Email::parse(email) else {
            return Err(ShopError::Unauthenticated);
        };

        let Some((user, hash)) = self.shop.store().get_password_hash(&email).await? else {
            tracing::info!("Sign-in for unknown email");
            return Err(ShopError::Unauthenticated);
        };

        match verify_password(password, &hash) {
            Ok(()) => {}
            Err(credentials::CredentialError::InvalidCredentials) => {
                tracing::info!(user_id = %user.id, "Sign-in with wrong password");
                return Err(ShopError::Unauthenticated);
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user_id = %user.id, "User signed in");
        self.sign_in(user)
    }

    /// Drop the session.
    #[must_use]
    pub fn signout(&self) -> SignedOut {
        clear_sentry_user();
        SignedOut {
            message: "Goodbye!",
            cookie: SessionCookie::cleared(),
        }
    }

    /// Store a one-hour reset token for the user and mail them a link.
    ///
    /// Mail delivery problems are logged and reported, never returned: the
    /// token is already stored and a second request issues a fresh one.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a malformed email
    /// - `NotFound("user")` when no account uses the email
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<SuccessMessage> {
        let email = Email::parse(email)?;
        let store = self.shop.store();
        let user = store
            .get_user_by_email(&email)
            .await?
            .ok_or(ShopError::NotFound("user"))?;

        let reset = issue_reset_token(Utc::now());
        store
            .set_reset_token(user.id, &reset.token, reset.expires_at)
            .await?;
        add_breadcrumb("accounts", "Reset token issued", None);

        let message = password_reset_message(&self.shop.settings().frontend_url, &reset.token);
        if let Err(err) = self.shop.mailer().send_mail(&user.email, &message).await {
            let err = ShopError::from(err).report();
            tracing::warn!(user_id = %user.id, error = %err, "Reset mail not delivered");
        }

        Ok(SuccessMessage { message: "Thanks!" })
    }

    /// Set a new password using a reset token and sign the user in.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the passwords differ or are too weak
    /// - `InvalidOrExpiredToken` if the token is unknown, used or expired
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<SignedIn> {
        if password != confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .shop
            .store()
            .consume_reset_token(reset_token, Utc::now(), &password_hash)
            .await?
            .ok_or(ShopError::InvalidOrExpiredToken)?;

        tracing::info!(user_id = %user.id, "Password reset");
        self.sign_in(user)
    }

    /// Replace a user's permissions.
    ///
    /// The caller's own permissions are re-read from the store first.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller, or if the caller no longer exists
    /// - `Forbidden` unless the caller holds `ADMIN` or `PERMISSIONUPDATE`
    /// - `ValidationFailed` for an empty permission set
    /// - `NotFound("user")` for an unknown target
    #[instrument(skip(self, caller), fields(caller_id))]
    pub async fn update_permissions(
        &self,
        caller: Option<&Caller>,
        user_id: UserId,
        permissions: PermissionSet,
    ) -> Result<User> {
        let caller = require_caller(caller)?;
        tracing::Span::current().record("caller_id", caller.user_id.as_i32());

        let store = self.shop.store();
        let current = store
            .get_user(caller.user_id)
            .await?
            .ok_or(ShopError::Unauthenticated)?;
        Policy::any_of(USER_ADMIN).authorize(Some(&Caller::from_user(&current)))?;

        if permissions.is_empty() {
            return Err(ValidationError::EmptyPermissions.into());
        }

        let user = store.set_permissions(user_id, &permissions).await?;
        tracing::info!(
            user_id = %user.id,
            permissions = %user.permissions,
            "Permissions updated"
        );
        Ok(user)
    }

    /// The caller's account, if signed in.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Store` if the lookup fails.
    pub async fn me(&self, caller: Option<&Caller>) -> Result<Option<User>> {
        match caller {
            Some(caller) => Ok(self.shop.store().get_user(caller.user_id).await?),
            None => Ok(None),
        }
    }

    /// Every account, for user administration.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` or `Forbidden` unless the caller holds `ADMIN` or
    /// `PERMISSIONUPDATE`.
    pub async fn users(&self, caller: Option<&Caller>) -> Result<Vec<User>> {
        Policy::any_of(USER_ADMIN).authorize(caller)?;
        Ok(self.shop.store().list_users().await?)
    }
}
