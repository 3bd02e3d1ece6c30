use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEntry, AuditLog, DEFAULT_AUDIT_CAPACITY};
use crate::cache::Cache;
use crate::config::Config;
use crate::error::{Error, Result, StoreError};
use crate::memory_cache::MemoryCache;
use crate::role::{CapabilityTier, Role};
use crate::sink::{AuditDispatcher, AuditEvent, AuditSink, DEFAULT_AUDIT_QUEUE_CAPACITY};
use crate::store::{RoleStore, RoleWriter};
use crate::types::{SessionId, UserId};

/// Audit action recorded when moderator access is granted.
pub const ACTION_MODERATOR_ACCESS_VERIFIED: &str = "Moderator access verified";
/// Audit action recorded when session access is granted.
pub const ACTION_SESSION_ACCESS_VERIFIED: &str = "Session access verified";
/// Audit action recorded after a role change.
pub const ACTION_ROLE_UPDATED: &str = "Role updated";

pub(crate) const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a resolved role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Source {
    /// Read from the profile store.
    Store,
    /// Served from the role cache.
    Cache,
}

/// Snapshot of a successful role verification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VerificationResult {
    /// Verified user.
    pub user_id: UserId,
    /// Role of the user.
    pub role: Role,
    /// Tier derived from `role`.
    pub capability_tier: CapabilityTier,
    /// Always `true`; failures are reported as errors.
    pub verified: bool,
    /// Whether the role came from the store or the cache.
    pub source: Source,
    /// When the verification completed.
    pub timestamp: DateTime<Utc>,
}

impl VerificationResult {
    /// Returns whether the user holds the moderator tier.
    pub fn is_moderator(&self) -> bool {
        self.capability_tier == CapabilityTier::Moderator
    }
}

/// Role resolver with pluggable store, cache and audit sink.
///
/// Share it across tasks through an [`Arc`]; every method takes `&self`.
#[derive(Debug)]
pub struct Resolver<S, C = MemoryCache> {
    store: S,
    cache: C,
    audit_log: Arc<AuditLog>,
    dispatcher: AuditDispatcher,
    store_timeout: Duration,
}

/// Builder for [`Resolver`].
pub struct ResolverBuilder<S, C = MemoryCache> {
    store: S,
    cache: C,
    audit_log: Option<Arc<AuditLog>>,
    audit_capacity: usize,
    audit_queue_capacity: usize,
    dispatcher: AuditDispatcher,
    store_timeout: Duration,
}

impl<S> ResolverBuilder<S, MemoryCache> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: MemoryCache::new(),
            audit_log: None,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            audit_queue_capacity: DEFAULT_AUDIT_QUEUE_CAPACITY,
            dispatcher: AuditDispatcher::disabled(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Creates a builder whose cache, audit log and timeouts follow `config`.
    ///
    /// Fails with [`Error::InvalidConfig`] if `config` does not validate.
    pub fn from_config(store: S, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache: MemoryCache::new().with_ttl(config.cache_ttl),
            audit_log: None,
            audit_capacity: config.audit_capacity,
            audit_queue_capacity: config.audit_queue_capacity,
            dispatcher: AuditDispatcher::disabled(),
            store_timeout: config.store_timeout,
        })
    }
}

impl<S, C> ResolverBuilder<S, C> {
    /// Sets the deadline for store fetches.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Uses a shared audit log instead of creating one.
    pub fn audit_log(mut self, log: Arc<AuditLog>) -> Self {
        self.audit_log = Some(log);
        self
    }

    /// Sets the capacity of the audit log created by [`ResolverBuilder::build`].
    pub fn audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity;
        self
    }

    /// Uses an existing dispatcher for sink writes.
    pub fn audit_dispatcher(mut self, dispatcher: AuditDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Spawns a dispatcher for `sink` on the current tokio runtime.
    pub fn audit_sink<K>(mut self, sink: K) -> Result<Self>
    where
        K: AuditSink + 'static,
    {
        self.dispatcher = AuditDispatcher::spawn(sink, self.audit_queue_capacity)?;
        Ok(self)
    }

    /// Sets the cache implementation.
    pub fn cache<C2: Cache>(self, cache: C2) -> ResolverBuilder<S, C2> {
        ResolverBuilder {
            store: self.store,
            cache,
            audit_log: self.audit_log,
            audit_capacity: self.audit_capacity,
            audit_queue_capacity: self.audit_queue_capacity,
            dispatcher: self.dispatcher,
            store_timeout: self.store_timeout,
        }
    }

    /// Builds the resolver.
    pub fn build(self) -> Resolver<S, C> {
        let audit_log = self
            .audit_log
            .unwrap_or_else(|| Arc::new(AuditLog::new(self.audit_capacity)));

        Resolver {
            store: self.store,
            cache: self.cache,
            audit_log,
            dispatcher: self.dispatcher,
            store_timeout: self.store_timeout,
        }
    }
}

impl<S, C> Resolver<S, C> {
    /// Returns the in-memory audit log.
    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit_log
    }

    /// Returns the role cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the default store deadline.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

impl<S, C> Resolver<S, C>
where
    S: RoleStore,
    C: Cache,
{
    /// Resolves the role of a user, optionally requiring the moderator tier.
    pub async fn resolve(
        &self,
        user: &UserId,
        require_moderator: bool,
    ) -> Result<VerificationResult> {
        self.resolve_within(user, require_moderator, self.store_timeout)
            .await
    }

    /// Like [`Resolver::resolve`] with a caller-supplied store deadline.
    pub async fn resolve_within(
        &self,
        user: &UserId,
        require_moderator: bool,
        deadline: Duration,
    ) -> Result<VerificationResult> {
        if let Some(entry) = self.cache.get(user) {
            debug!(user_id = %user, role = %entry.role, "role cache hit");
            return self.check(user, entry.role, Source::Cache, require_moderator);
        }

        let role = self.fetch_role(user, deadline).await?;
        self.cache.put(user, role.clone());
        self.check(user, role, Source::Store, require_moderator)
    }

    /// Requires the moderator tier and records the grant.
    ///
    /// Denials propagate as errors and are not written to the audit trail.
    pub async fn verify_moderator_access(
        &self,
        user: &UserId,
        session: Option<&SessionId>,
    ) -> Result<VerificationResult> {
        let result = self.resolve(user, true).await?;
        self.record(
            AuditEntry::granted(
                user.clone(),
                ACTION_MODERATOR_ACCESS_VERIFIED,
                result.role.clone(),
            )
            .with_resource(session.cloned()),
        );
        Ok(result)
    }

    /// Verifies that a user may join a session and records the grant.
    pub async fn verify_session_access(
        &self,
        user: &UserId,
        session: &SessionId,
        require_moderator: bool,
    ) -> Result<VerificationResult> {
        let result = self.resolve(user, require_moderator).await?;
        self.record(
            AuditEntry::granted(
                user.clone(),
                ACTION_SESSION_ACCESS_VERIFIED,
                result.role.clone(),
            )
            .with_resource(Some(session.clone()))
            .with_details(format!("require_moderator={require_moderator}")),
        );
        Ok(result)
    }

    /// Returns whether the user holds the moderator tier.
    ///
    /// Never fails: any error, transient or not, yields `false`.
    pub async fn has_moderator_privileges(&self, user: &UserId) -> bool {
        match self.resolve(user, false).await {
            Ok(result) => result.is_moderator(),
            Err(err) => {
                debug!(user_id = %user, error = %err, "moderator check failed, denying");
                false
            }
        }
    }

    /// Drops the cached role of a user.
    ///
    /// Call this right after changing the user's role in the store.
    pub fn invalidate(&self, user: &UserId) {
        self.cache.invalidate(user);
    }

    /// Drops every cached role.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn fetch_role(&self, user: &UserId, deadline: Duration) -> Result<Role> {
        let profile = match tokio::time::timeout(deadline, self.store.get_profile(user)).await {
            Ok(Ok(profile)) => profile,
            Ok(Err(source)) => return Err(self.store_failure(user, source)),
            Err(_) => {
                warn!(user_id = %user, timeout = ?deadline, "role store fetch timed out");
                return Err(Error::StoreUnavailable {
                    user: user.clone(),
                    timeout: deadline,
                });
            }
        };

        let Some(profile) = profile else {
            return Err(Error::UserNotFound { user: user.clone() });
        };
        let Some(role) = profile.parsed_role() else {
            error!(user_id = %user, "profile has no role defined");
            return Err(Error::RoleNotDefined { user: user.clone() });
        };

        debug!(user_id = %user, role = %role, "role loaded from store");
        Ok(role)
    }

    fn store_failure(&self, user: &UserId, source: StoreError) -> Error {
        match source.downcast::<Error>() {
            Ok(typed) => *typed,
            Err(source) => {
                warn!(user_id = %user, error = %source, "role store failed");
                Error::RoleVerificationFailed {
                    user: user.clone(),
                    source,
                }
            }
        }
    }

    fn check(
        &self,
        user: &UserId,
        role: Role,
        source: Source,
        require_moderator: bool,
    ) -> Result<VerificationResult> {
        let capability_tier = role.capability();
        if require_moderator && capability_tier != CapabilityTier::Moderator {
            info!(user_id = %user, role = %role, "moderator access denied");
            return Err(Error::InsufficientPermissions {
                user: user.clone(),
                role: role.to_string(),
            });
        }

        Ok(VerificationResult {
            user_id: user.clone(),
            role,
            capability_tier,
            verified: true,
            source,
            timestamp: Utc::now(),
        })
    }

    fn record(&self, entry: AuditEntry) {
        self.dispatcher.dispatch(AuditEvent::from_entry(&entry));
        self.audit_log.append(entry);
    }
}

impl<S, C> Resolver<S, C>
where
    S: RoleWriter,
    C: Cache,
{
    /// Persists a new role and invalidates the cached one.
    ///
    /// The cache entry is dropped even when the write fails, since a failed
    /// or timed-out write may still have reached the store.
    pub async fn update_role(&self, user: &UserId, role: Role) -> Result<()> {
        let write = self.store.set_role(user, &role);
        let outcome = tokio::time::timeout(self.store_timeout, write).await;
        self.cache.invalidate(user);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(self.store_failure(user, source)),
            Err(_) => {
                warn!(user_id = %user, timeout = ?self.store_timeout, "role store write timed out");
                return Err(Error::StoreUnavailable {
                    user: user.clone(),
                    timeout: self.store_timeout,
                });
            }
        }

        info!(user_id = %user, role = %role, "role updated");
        self.record(AuditEntry::granted(user.clone(), ACTION_ROLE_UPDATED, role));
        Ok(())
    }
}
