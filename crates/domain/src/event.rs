//! Inbound events delivered by the chat platform.
//!
//! The transport layer translates gateway payloads into these types and
//! publishes them on the event bus; the engines never see raw platform data.

use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, CommunityId, MessageId, RoleId, UserId};
use crate::member::Member;
use crate::time::Timestamp;

/// Direction of a role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChange {
    Added,
    Removed,
}

/// A role was added to or removed from a member.
///
/// `member` is the snapshot *after* the change was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEvent {
    pub change: RoleChange,
    pub role: RoleId,
    pub member: Member,
}

impl MemberEvent {
    #[must_use]
    pub fn role_added(member: Member, role: RoleId) -> Self {
        Self {
            change: RoleChange::Added,
            role,
            member,
        }
    }

    #[must_use]
    pub fn role_removed(member: Member, role: RoleId) -> Self {
        Self {
            change: RoleChange::Removed,
            role,
            member,
        }
    }

    #[must_use]
    pub fn community(&self) -> CommunityId {
        self.member.community
    }
}

/// A chat message as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub community: CommunityId,
    pub channel: ChannelId,
    pub author: UserId,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: Timestamp,
}

/// Message lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    Created(Message),
    Edited {
        community: CommunityId,
        channel: ChannelId,
        message: MessageId,
        author: UserId,
        content: String,
    },
    Deleted {
        community: CommunityId,
        channel: ChannelId,
        message: MessageId,
    },
}

impl MessageEvent {
    /// Channel the event happened in.
    #[must_use]
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::Created(message) => message.channel,
            Self::Edited { channel, .. } | Self::Deleted { channel, .. } => *channel,
        }
    }
}

/// Everything the event router accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InboundEvent {
    Member(MemberEvent),
    Message(MessageEvent),
}
