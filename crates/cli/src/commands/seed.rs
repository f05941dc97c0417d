//! Seed the catalog from a YAML file.
//!
//! The file is a list of items with prices in minor units:
//!
//! ```yaml
//! - title: Fan Pack
//!   description: Three fans for the price of two
//!   image: https://images.example.com/fans.jpg
//!   price: 4999
//! ```
//!
//! Items go through the same validation and permission checks as items
//! created in the shop, owned by the given user.

use std::path::Path;

use tracing::{error, info};

use sick_fits_shop::Caller;
use sick_fits_shop::models::NewItem;

use super::{CliError, connect, find_user};

/// Create every item in `path`, owned by the user with email `owner`.
///
/// Invalid items are logged and skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, configuration is
/// missing, or the owner does not exist.
pub async fn items(path: &Path, owner: &str) -> Result<(), CliError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;

    // Parse before connecting to the database
    let items: Vec<NewItem> = serde_yaml::from_str(&content)?;
    info!(path = %path.display(), items = items.len(), "Parsed seed file");

    let shop = connect().await?;
    let owner = find_user(&shop, owner).await?;
    let caller = Caller::from_user(&owner);
    let catalog = shop.catalog();

    let mut created = 0usize;
    let mut skipped = 0usize;
    for item in items {
        let title = item.title.clone();
        match catalog.create_item(Some(&caller), item).await {
            Ok(item) => {
                created += 1;
                info!(item_id = %item.id, title = %item.title, "Created item");
            }
            Err(err) => {
                skipped += 1;
                error!(title = %title, error = %err, "Skipped item");
            }
        }
    }

    info!(created, skipped, owner = %owner.email, "Seeding complete!");
    Ok(())
}
