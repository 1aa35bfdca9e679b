//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`WardenError`]
//! via `#[from]`. Adapters wrap their IO failures in [`WardenError::Storage`].

use std::time::Duration;

use crate::id::{CommunityId, RoleId, UserId};

/// Top-level error for every guildwarden operation.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("external api error")]
    ExternalApi(#[from] ExternalApiError),

    #[error("state conflict")]
    StateConflict(#[from] StateConflictError),

    #[error("deferred grant expired")]
    ExpiredDeferral(#[from] ExpiredDeferral),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl WardenError {
    /// Whether retrying the failed call may succeed: transient platform
    /// failures and per-call timeouts.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExternalApi(err) => err.is_transient(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Delay requested by the platform before the next attempt, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ExternalApi(ExternalApiError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }

    /// Wrap an adapter failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// A rule, link or task definition that breaks a domain invariant.
///
/// Raised at creation time; such definitions are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("a rule named {0:?} already exists in this community")]
    DuplicateName(String),

    #[error("rule has no roles to add or remove")]
    NoRoleChanges,

    #[error("role {0} is both added and removed")]
    OverlappingRoles(RoleId),

    #[error("role {0} cannot be part of its own condition")]
    SelfReferencingRole(RoleId),

    #[error("invalid role identifier {0:?}")]
    InvalidRoleId(String),

    #[error("source and target channel must differ")]
    SameChannel,

    #[error("interval must be positive")]
    ZeroInterval,

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),

    #[error("payload does not match task kind {0}")]
    PayloadMismatch(&'static str),

    #[error("duration must be positive")]
    ZeroDuration,
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failure reported by the Membership or Messaging API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalApiError {
    #[error("rate limited by the platform")]
    RateLimited { retry_after: Option<Duration> },

    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("unknown platform object: {0}")]
    UnknownObject(String),

    #[error("network failure: {0}")]
    Network(String),
}

impl ExternalApiError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }
}

/// Concurrent writers collided on the same key and retries ran out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("concurrent update on {resource} {key} after {attempts} attempts")]
pub struct StateConflictError {
    pub resource: &'static str,
    pub key: String,
    pub attempts: u32,
}

/// A conditional-role deferral aged past its horizon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("deferred grant of role {role} to {member} in {community} expired")]
pub struct ExpiredDeferral {
    pub community: CommunityId,
    pub member: UserId,
    pub role: RoleId,
}
