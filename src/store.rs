use crate::error::StoreError;
use crate::role::Role;
use crate::types::UserId;
use async_trait::async_trait;

/// Profile record returned by the store.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    /// Raw role value. `None` or empty means the role was never set.
    pub role: Option<String>,
    /// Display name, if known.
    pub display_name: Option<String>,
}

impl Profile {
    /// Creates a profile carrying only a role.
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            display_name: None,
        }
    }

    /// Returns the parsed role, or `None` when it is missing or empty.
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse)
    }
}

/// Source of truth for user roles.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Returns the profile of a user, or `None` when the user is unknown.
    async fn get_profile(&self, user: &UserId) -> std::result::Result<Option<Profile>, StoreError>;
}

/// Store interface for role mutations.
#[async_trait]
pub trait RoleWriter: RoleStore {
    /// Persists a new role for a user.
    async fn set_role(&self, user: &UserId, role: &Role) -> std::result::Result<(), StoreError>;
}
