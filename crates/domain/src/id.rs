//! Typed identifier newtypes.
//!
//! Identifiers minted by guildwarden itself (rules, links, tasks, log entries)
//! are UUID-backed. Identifiers owned by the chat platform (communities,
//! channels, roles, users, messages) are opaque 64-bit snowflakes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! define_snowflake {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw platform identifier.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Access the raw platform identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`AutomationRule`](crate::automation::AutomationRule).
    RuleId
);

define_id!(
    /// Unique identifier for a [`ChannelRestriction`](crate::automation::ChannelRestriction).
    RestrictionId
);

define_id!(
    /// Unique identifier for a [`MirrorLink`](crate::mirror::MirrorLink).
    LinkId
);

define_id!(
    /// Unique identifier for a [`ScheduledTask`](crate::task::ScheduledTask).
    TaskId
);

define_id!(
    /// Unique identifier for a [`TaskLogEntry`](crate::task_log::TaskLogEntry).
    LogEntryId
);

define_snowflake!(
    /// A community (server / workspace) on the chat platform.
    CommunityId
);

define_snowflake!(
    /// A text channel.
    ChannelId
);

define_snowflake!(
    /// A grantable role.
    RoleId
);

define_snowflake!(
    /// A user / community member.
    UserId
);

define_snowflake!(
    /// A chat message.
    MessageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = RuleId::new();
        let parsed: RuleId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        assert!(LinkId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn should_serialize_snowflake_as_plain_number() {
        let role = RoleId::new(1_234_567_890_123);
        assert_eq!(serde_json::to_string(&role).unwrap(), "1234567890123");
        let back: RoleId = serde_json::from_str("1234567890123").unwrap();
        assert_eq!(back, role);
    }

    #[test]
    fn should_parse_snowflake_with_surrounding_whitespace() {
        let channel: ChannelId = " 42 ".parse().unwrap();
        assert_eq!(channel.get(), 42);
    }

    #[test]
    fn should_reject_non_numeric_snowflake() {
        assert!(UserId::from_str("@someone").is_err());
    }
}
