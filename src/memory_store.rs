use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use crate::role::Role;
use crate::store::{Profile, RoleStore, RoleWriter};
use crate::types::UserId;

/// In-memory profile store for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<UserId, Profile>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a profile.
    pub fn set_profile(&self, user: UserId, profile: Profile) {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.insert(user, profile);
    }

    /// Sets the raw role value of a user, creating the profile if needed.
    pub fn set_raw_role(&self, user: UserId, role: impl Into<String>) {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.entry(user).or_default().role = Some(role.into());
    }

    /// Removes a user's profile.
    pub fn remove_profile(&self, user: &UserId) {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.remove(user);
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn get_profile(
        &self,
        user: &UserId,
    ) -> std::result::Result<Option<Profile>, crate::StoreError> {
        let guard = self.inner.read().expect("poisoned lock");
        Ok(guard.get(user).cloned())
    }
}

#[async_trait]
impl RoleWriter for MemoryStore {
    async fn set_role(
        &self,
        user: &UserId,
        role: &Role,
    ) -> std::result::Result<(), crate::StoreError> {
        self.set_raw_role(user.clone(), role.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::CapabilityTier;

    #[tokio::test]
    async fn memory_store_should_support_basic_flow() {
        let store = MemoryStore::new();
        let user = UserId::try_from("user_1").unwrap();
        store.set_profile(user.clone(), Profile::with_role("admin"));

        let resolver = crate::ResolverBuilder::new(store).build();
        let result = resolver.resolve(&user, true).await.unwrap();

        assert_eq!(result.capability_tier, CapabilityTier::Moderator);
    }

    #[tokio::test]
    async fn set_role_should_create_missing_profile() {
        let store = MemoryStore::new();
        let user = UserId::try_from("user_2").unwrap();

        store.set_role(&user, &Role::Client).await.unwrap();

        let profile = store.get_profile(&user).await.unwrap().unwrap();
        assert_eq!(profile.parsed_role(), Some(Role::Client));
    }

    #[tokio::test]
    async fn removed_profile_should_read_as_missing() {
        let store = MemoryStore::new();
        let user = UserId::try_from("user_3").unwrap();
        store.set_raw_role(user.clone(), "therapist");
        store.remove_profile(&user);

        assert!(store.get_profile(&user).await.unwrap().is_none());
    }
}
