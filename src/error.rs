use crate::types::UserId;
use std::time::Duration;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Policy and integrity failures ([`Error::is_denial`]) must be surfaced to
/// callers as a hard access denial. Infrastructure failures
/// ([`Error::is_retryable`]) should be surfaced as "service unavailable".
#[derive(Debug, Error)]
pub enum Error {
    /// The profile store has no profile for the user.
    #[error("user not found: {user}")]
    UserNotFound { user: UserId },
    /// The profile exists but carries no role.
    #[error("role not defined for user {user}")]
    RoleNotDefined { user: UserId },
    /// The user's capability tier does not satisfy the requirement.
    #[error("insufficient permissions for user {user} with role {role}")]
    InsufficientPermissions { user: UserId, role: String },
    /// The store failed while resolving or updating the role.
    #[error("role verification failed for user {user}: {source}")]
    RoleVerificationFailed {
        user: UserId,
        #[source]
        source: StoreError,
    },
    /// The store did not answer within the deadline.
    #[error("role store unavailable for user {user}: no response within {timeout:?}")]
    StoreUnavailable { user: UserId, timeout: Duration },
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns whether the failure is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RoleVerificationFailed { .. } | Self::StoreUnavailable { .. }
        )
    }

    /// Returns whether the failure is a policy or data-integrity denial.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound { .. }
                | Self::RoleNotDefined { .. }
                | Self::InsufficientPermissions { .. }
        )
    }
}
