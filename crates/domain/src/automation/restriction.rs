use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, CommunityId, RestrictionId, RoleId};
use crate::member::Member;
use crate::time::{Timestamp, delta};

/// Which channel functionality a restriction governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionScope {
    Messages,
    Joins,
}

impl RestrictionScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Joins => "joins",
        }
    }
}

impl fmt::Display for RestrictionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestrictionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "messages" => Ok(Self::Messages),
            "joins" => Ok(Self::Joins),
            other => Err(format!("unknown restriction scope {other:?}")),
        }
    }
}

/// Requires `gating_role` (and optionally `threshold` of seniority) to use a
/// channel within `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRestriction {
    pub id: RestrictionId,
    pub community: CommunityId,
    pub channel: ChannelId,
    pub gating_role: RoleId,
    pub threshold: Option<Duration>,
    pub scope: RestrictionScope,
}

impl ChannelRestriction {
    #[must_use]
    pub fn new(
        community: CommunityId,
        channel: ChannelId,
        gating_role: RoleId,
        scope: RestrictionScope,
    ) -> Self {
        Self {
            id: RestrictionId::new(),
            community,
            channel,
            gating_role,
            threshold: None,
            scope,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Whether `member` satisfies this restriction at `now`.
    #[must_use]
    pub fn permits(&self, member: &Member, now: Timestamp) -> bool {
        if !member.has_role(self.gating_role) {
            return false;
        }
        match self.threshold {
            Some(threshold) => now - member.reference_time() >= delta(threshold),
            None => true,
        }
    }
}
