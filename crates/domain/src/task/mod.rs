//! Scheduled background work: reminders, timers, alarms, poll lifecycle and
//! internal follow-ups (penalty expiry, deferral re-checks).

mod recurrence;

pub use recurrence::{Recurrence, Zone};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WardenError};
use crate::id::{ChannelId, CommunityId, MessageId, RoleId, TaskId, UserId};
use crate::time::Timestamp;

/// Discriminant of a [`TaskPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Reminder,
    Timer,
    Alarm,
    PollClose,
    PollRefresh,
    RoleExpiry,
    DeferralRecheck,
}

impl TaskKind {
    pub const ALL: [Self; 7] = [
        Self::Reminder,
        Self::Timer,
        Self::Alarm,
        Self::PollClose,
        Self::PollRefresh,
        Self::RoleExpiry,
        Self::DeferralRecheck,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Timer => "timer",
            Self::Alarm => "alarm",
            Self::PollClose => "poll_close",
            Self::PollRefresh => "poll_refresh",
            Self::RoleExpiry => "role_expiry",
            Self::DeferralRecheck => "deferral_recheck",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown task kind {s:?}"))
    }
}

/// What a task does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Reminder {
        /// Channel to post in; falls back to a direct message.
        channel: Option<ChannelId>,
        user: UserId,
        message: String,
    },
    Timer {
        channel: ChannelId,
        user: UserId,
        label: Option<String>,
        /// Countdown message edited to show completion.
        message_id: Option<MessageId>,
    },
    Alarm {
        channel: ChannelId,
        message: String,
    },
    PollClose {
        channel: ChannelId,
        message_id: MessageId,
        question: String,
    },
    PollRefresh {
        channel: ChannelId,
        message_id: MessageId,
        content: String,
    },
    RoleExpiry {
        member: UserId,
        role: RoleId,
    },
    DeferralRecheck {
        member: UserId,
        role: RoleId,
    },
}

impl TaskPayload {
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Reminder { .. } => TaskKind::Reminder,
            Self::Timer { .. } => TaskKind::Timer,
            Self::Alarm { .. } => TaskKind::Alarm,
            Self::PollClose { .. } => TaskKind::PollClose,
            Self::PollRefresh { .. } => TaskKind::PollRefresh,
            Self::RoleExpiry { .. } => TaskKind::RoleExpiry,
            Self::DeferralRecheck { .. } => TaskKind::DeferralRecheck,
        }
    }

    /// Whether the platform call needs a community context.
    #[must_use]
    pub fn requires_community(&self) -> bool {
        matches!(self, Self::RoleExpiry { .. } | Self::DeferralRecheck { .. })
    }
}

/// A unit of deferred work owned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub community: Option<CommunityId>,
    pub kind: TaskKind,
    pub due_time: Timestamp,
    pub recurrence: Recurrence,
    pub payload: TaskPayload,
    pub cancelled: bool,
    pub created_at: Timestamp,
}

impl ScheduledTask {
    /// Create a one-shot task; the kind is taken from the payload.
    #[must_use]
    pub fn new(community: Option<CommunityId>, due_time: Timestamp, payload: TaskPayload) -> Self {
        Self {
            id: TaskId::new(),
            community,
            kind: payload.kind(),
            due_time,
            recurrence: Recurrence::None,
            payload,
            cancelled: false,
            created_at: crate::time::now(),
        }
    }

    #[must_use]
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PayloadMismatch`] when `kind` disagrees with
    /// the payload or a role task lacks a community, and any error from
    /// [`Recurrence::validate`].
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.payload.kind() != self.kind {
            return Err(ValidationError::PayloadMismatch(self.kind.as_str()).into());
        }
        if self.payload.requires_community() && self.community.is_none() {
            return Err(ValidationError::PayloadMismatch(self.kind.as_str()).into());
        }
        self.recurrence.validate()
    }

    /// Label used for task log entries.
    #[must_use]
    pub fn task_ref(&self) -> &'static str {
        self.kind.as_str()
    }
}
