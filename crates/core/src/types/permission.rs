//! Role-based permissions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single permission held by a user.
///
/// Serialized in upper case without separators (`ITEMDELETE`), which is also
/// the form stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    /// Regular signed-up customer.
    User,
    /// Full access, including other users' orders.
    Admin,
    /// May list items for sale.
    ItemCreate,
    /// May edit items owned by anyone.
    ItemUpdate,
    /// May delete items owned by anyone.
    ItemDelete,
    /// May change other users' permissions.
    PermissionUpdate,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::User,
        Self::Admin,
        Self::ItemCreate,
        Self::ItemUpdate,
        Self::ItemDelete,
        Self::PermissionUpdate,
    ];

    /// Stored/serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::ItemCreate => "ITEMCREATE",
            Self::ItemUpdate => "ITEMUPDATE",
            Self::ItemDelete => "ITEMDELETE",
            Self::PermissionUpdate => "PERMISSIONUPDATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown permission name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid permission: {0}")]
pub struct PermissionError(pub String);

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PermissionError(s.to_owned()))
    }
}

/// The set of permissions held by a user.
///
/// Ordered so that stored and serialized forms are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// The set granted to every new account: `{USER}`.
    #[must_use]
    pub fn signup_default() -> Self {
        Self::from_iter([Permission::User])
    }

    /// Whether the set holds `permission`.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Whether the set holds at least one of `permissions`.
    ///
    /// Always `false` for an empty slice.
    #[must_use]
    pub fn contains_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.0.contains(p))
    }

    /// Add a permission. Returns `false` if it was already present.
    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    /// Number of permissions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no permission is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in stable order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Stored names, e.g. `["USER", "ADMIN"]`.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|p| p.as_str().to_owned()).collect()
    }

    /// Parse stored names.
    ///
    /// # Errors
    ///
    /// Returns `PermissionError` for the first unknown name.
    pub fn parse_all<I, S>(names: I) -> Result<Self, PermissionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<Permission>())
            .collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Permission::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_round_trips_through_str() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert_eq!(
            "itemdelete".parse::<Permission>().unwrap(),
            Permission::ItemDelete
        );
        assert!("SUPERUSER".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_stored_names() {
        let json = serde_json::to_string(&Permission::PermissionUpdate).unwrap();
        assert_eq!(json, "\"PERMISSIONUPDATE\"");

        let set: PermissionSet = serde_json::from_str("[\"ADMIN\", \"USER\"]").unwrap();
        assert!(set.contains(Permission::Admin));
        assert!(set.contains(Permission::User));
    }

    #[test]
    fn test_contains_any() {
        let set = PermissionSet::signup_default();
        assert!(set.contains_any(&[Permission::Admin, Permission::User]));
        assert!(!set.contains_any(&[Permission::Admin, Permission::ItemDelete]));
        assert!(!set.contains_any(&[]));
    }

    #[test]
    fn test_parse_all() {
        let set = PermissionSet::parse_all(["USER", "ITEMCREATE"]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_strings(), vec!["USER", "ITEMCREATE"]);

        let err = PermissionSet::parse_all(["USER", "ROOT"]).unwrap_err();
        assert_eq!(err, PermissionError("ROOT".to_owned()));
    }

    #[test]
    fn test_display() {
        let set = PermissionSet::from_iter([Permission::Admin, Permission::User]);
        assert_eq!(set.to_string(), "{USER, ADMIN}");
    }
}
