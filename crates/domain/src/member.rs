//! Member — a point-in-time snapshot of a community member and their roles.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{CommunityId, RoleId, UserId};
use crate::time::Timestamp;

/// A member as reported by the Membership API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub community: CommunityId,
    pub roles: BTreeSet<RoleId>,
    pub is_bot: bool,
    pub joined_at: Timestamp,
    /// When the member passed verification, if the platform tracks it.
    pub verified_at: Option<Timestamp>,
}

impl Member {
    /// Create a non-bot member with no roles.
    #[must_use]
    pub fn new(id: UserId, community: CommunityId, joined_at: Timestamp) -> Self {
        Self {
            id,
            community,
            roles: BTreeSet::new(),
            is_bot: false,
            joined_at,
            verified_at: None,
        }
    }

    /// Builder-style helper to attach roles.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles.extend(roles);
        self
    }

    #[must_use]
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    /// Roles from `candidates` that this member currently holds.
    #[must_use]
    pub fn held_among(&self, candidates: &BTreeSet<RoleId>) -> Vec<RoleId> {
        candidates.intersection(&self.roles).copied().collect()
    }

    /// The moment restriction thresholds are measured from.
    #[must_use]
    pub fn reference_time(&self) -> Timestamp {
        self.verified_at.unwrap_or(self.joined_at)
    }
}
