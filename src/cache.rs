use crate::role::Role;
use crate::types::UserId;
use std::time::Instant;

/// Cached role for a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedRoleEntry {
    /// Role as last read from the store.
    pub role: Role,
    /// When the role was read.
    pub cached_at: Instant,
}

/// Cache interface for resolved roles.
///
/// Operations are synchronous; implementations must not block on I/O.
pub trait Cache: Send + Sync {
    /// Returns the cached role if it has not expired.
    fn get(&self, user: &UserId) -> Option<CachedRoleEntry>;

    /// Stores a role, replacing any previous entry.
    fn put(&self, user: &UserId, role: Role);

    /// Removes the entry for a user.
    fn invalidate(&self, user: &UserId);

    /// Removes every entry.
    fn invalidate_all(&self);
}

/// No-op cache implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _user: &UserId) -> Option<CachedRoleEntry> {
        None
    }

    fn put(&self, _user: &UserId, _role: Role) {}

    fn invalidate(&self, _user: &UserId) {}

    fn invalidate_all(&self) {}
}
