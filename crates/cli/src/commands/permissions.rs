//! Permission management commands.
//!
//! Operators use these to bootstrap the first `ADMIN`; after that, admins
//! can grant permissions through the shop itself.
//!
//! # Usage
//!
//! ```bash
//! sf-cli permissions grant -e wes@example.com -p ADMIN,PERMISSIONUPDATE
//! sf-cli permissions show -e wes@example.com
//! ```

use sick_fits_core::PermissionSet;
use sick_fits_shop::{ShopError, ValidationError};

use super::{CliError, connect, find_user};

/// Replace a user's permissions.
///
/// # Errors
///
/// Returns an error for an unknown user, an unknown permission name, or an
/// empty list.
pub async fn grant(email: &str, permissions: &[String]) -> Result<(), CliError> {
    let permissions = PermissionSet::parse_all(permissions.iter().map(|p| p.trim()))?;
    if permissions.is_empty() {
        return Err(ShopError::from(ValidationError::EmptyPermissions).into());
    }

    let shop = connect().await?;
    let user = find_user(&shop, email).await?;
    let user = shop.store().set_permissions(user.id, &permissions).await?;

    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        permissions = %user.permissions,
        "Permissions updated"
    );
    Ok(())
}

/// Print a user's permissions.
///
/// # Errors
///
/// Returns an error for an unknown user.
pub async fn show(email: &str) -> Result<(), CliError> {
    let shop = connect().await?;
    let user = find_user(&shop, email).await?;

    tracing::info!(
        user_id = %user.id,
        name = %user.name,
        permissions = %user.permissions,
        "User permissions"
    );
    Ok(())
}
