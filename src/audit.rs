//! In-memory audit trail of access-control decisions.
//!
//! [`AuditLog`] is a fixed-capacity ring buffer meant for fast introspection
//! (recent decisions, per-user history). It is not the system of record;
//! durable audit goes through [`crate::AuditSink`].

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::role::{CapabilityTier, Role};
use crate::types::{SessionId, UserId};

/// Default number of entries retained by [`AuditLog`].
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// A recorded access-control decision.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuditEntry {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Subject of the decision.
    pub user_id: UserId,
    /// Human-readable action, e.g. `"Moderator access verified"`.
    pub action: String,
    /// Session the decision applies to, if any.
    pub resource_id: Option<SessionId>,
    /// Role at decision time.
    pub role: Role,
    /// Tier derived from `role`.
    pub capability_tier: CapabilityTier,
    /// Whether access was granted.
    pub success: bool,
    /// Free-form details.
    pub details: Option<String>,
}

impl AuditEntry {
    /// Creates a successful entry stamped with the current time.
    pub fn granted(user_id: UserId, action: impl Into<String>, role: Role) -> Self {
        let capability_tier = role.capability();
        Self {
            timestamp: Utc::now(),
            user_id,
            action: action.into(),
            resource_id: None,
            role,
            capability_tier,
            success: true,
            details: None,
        }
    }

    /// Sets the resource the entry refers to.
    pub fn with_resource(mut self, resource_id: Option<SessionId>) -> Self {
        self.resource_id = resource_id;
        self
    }

    /// Sets free-form details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Bounded, append-only audit ring buffer.
///
/// Once full, each append evicts the oldest entry.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    /// Creates a log retaining at most `capacity` entries.
    ///
    /// A capacity of zero retains nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_CAPACITY))),
            capacity,
        }
    }

    /// Returns the maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn append(&self, entry: AuditEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut guard = self.lock();
        while guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    /// Returns up to `limit` most recent entries, oldest first.
    pub fn query_recent(&self, limit: usize) -> Vec<AuditEntry> {
        let guard = self.lock();
        let skip = guard.len().saturating_sub(limit);
        guard.iter().skip(skip).cloned().collect()
    }

    /// Returns up to `limit` most recent entries for a user, oldest first.
    pub fn query_by_user(&self, user: &UserId, limit: usize) -> Vec<AuditEntry> {
        let guard = self.lock();
        let mut matched: Vec<AuditEntry> = guard
            .iter()
            .rev()
            .filter(|entry| &entry.user_id == user)
            .take(limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
