use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cache::{Cache, CachedRoleEntry};
use crate::role::Role;
use crate::types::UserId;

/// Default time-to-live for cached roles.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// In-memory TTL cache for resolved roles.
///
/// Expiry is checked lazily when an entry is read; there is no background
/// sweep and no size-based eviction, since the active user set is small.
/// Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<HashMap<UserId, CachedRoleEntry>>>,
    ttl: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an empty cache with the default TTL.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Configures the time-to-live for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, CachedRoleEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(entry: &CachedRoleEntry, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.cached_at) < ttl
    }
}

impl Cache for MemoryCache {
    fn get(&self, user: &UserId) -> Option<CachedRoleEntry> {
        let now = Instant::now();
        let mut guard = self.lock();

        let entry = guard.get(user)?;
        if Self::is_fresh(entry, self.ttl, now) {
            return Some(entry.clone());
        }
        guard.remove(user);
        None
    }

    fn put(&self, user: &UserId, role: Role) {
        let entry = CachedRoleEntry {
            role,
            cached_at: Instant::now(),
        };
        self.lock().insert(user.clone(), entry);
    }

    fn invalidate(&self, user: &UserId) {
        self.lock().remove(user);
    }

    fn invalidate_all(&self) {
        self.lock().clear();
    }
}
