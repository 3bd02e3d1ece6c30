//! Role verification and audit for real-time session access control.
//!
//! Given a user id, the [`Resolver`] reads the user's role from a
//! [`RoleStore`], maps it to a [`CapabilityTier`] (moderator or participant),
//! caches it for a bounded time and records granted decisions in an
//! [`AuditLog`]. Errors are typed so callers can tell a denial
//! ([`Error::is_denial`]) from a transient failure ([`Error::is_retryable`]);
//! no path grants access on error.
//!
//! # Examples
//!
//! Verifying a moderator with the in-memory store (enable `memory-store`):
//! ```no_run
//! use rs_session_role::{Profile, ResolverBuilder, SessionId, UserId};
//! # #[cfg(feature = "memory-store")]
//! # async fn run() -> rs_session_role::Result<()> {
//! use rs_session_role::MemoryStore;
//! let store = MemoryStore::new();
//! let user = UserId::try_from("U1")?;
//! store.set_profile(user.clone(), Profile::with_role("therapist"));
//!
//! let resolver = ResolverBuilder::new(store).build();
//! let session = SessionId::try_from("SESSION-42")?;
//! let result = resolver.verify_moderator_access(&user, Some(&session)).await?;
//! assert!(result.is_moderator());
//! # Ok(())
//! # }
//! ```
//!
//! Building from configuration and fanning out over a roster:
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # async fn run() -> rs_session_role::Result<()> {
//! use std::sync::Arc;
//! use rs_session_role::{BatchVerifier, Config, MemoryStore, ResolverBuilder, TracingSink, UserId};
//! let config = Config::from_env()?;
//! let resolver = ResolverBuilder::from_config(MemoryStore::new(), &config)?
//!     .audit_sink(TracingSink)?
//!     .build();
//! let batch = BatchVerifier::from_config(Arc::new(resolver), &config)?;
//! let roster = vec![UserId::try_from("U1")?, UserId::try_from("U2")?];
//! let verified = batch.batch_verify(roster).await;
//! # let _ = verified;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod audit;
mod batch;
mod cache;
mod config;
mod error;
mod memory_cache;
mod resolver;
mod role;
mod sink;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::audit::{AuditEntry, AuditLog, DEFAULT_AUDIT_CAPACITY};
pub use crate::batch::BatchVerifier;
pub use crate::cache::{Cache, CachedRoleEntry, NoCache};
pub use crate::config::Config;
pub use crate::error::{Error, Result, StoreError};
pub use crate::memory_cache::{DEFAULT_CACHE_TTL, MemoryCache};
pub use crate::resolver::{
    ACTION_MODERATOR_ACCESS_VERIFIED, ACTION_ROLE_UPDATED, ACTION_SESSION_ACCESS_VERIFIED,
    Resolver, ResolverBuilder, Source, VerificationResult,
};
pub use crate::role::{CapabilityTier, Role, map_role_to_capability};
pub use crate::sink::{
    AuditDispatcher, AuditEvent, AuditSink, DEFAULT_AUDIT_QUEUE_CAPACITY, TracingSink,
};
pub use crate::store::{Profile, RoleStore, RoleWriter};
pub use crate::types::{SessionId, UserId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
