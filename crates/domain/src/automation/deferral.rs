use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{CommunityId, RoleId, UserId};
use crate::time::{Timestamp, delta};

/// A conditional-role grant waiting for the member's deferral roles to go away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredGrant {
    pub community: CommunityId,
    pub member: UserId,
    pub role: RoleId,
    pub queued_at: Timestamp,
}

impl DeferredGrant {
    #[must_use]
    pub fn new(community: CommunityId, member: UserId, role: RoleId, queued_at: Timestamp) -> Self {
        Self {
            community,
            member,
            role,
            queued_at,
        }
    }

    /// Moment after which the grant is dropped instead of retried.
    #[must_use]
    pub fn expires_at(&self, horizon: Duration) -> Timestamp {
        self.queued_at + delta(horizon)
    }

    #[must_use]
    pub fn is_expired(&self, now: Timestamp, horizon: Duration) -> bool {
        now > self.expires_at(horizon)
    }
}
