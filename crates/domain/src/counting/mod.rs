//! Counting channels: members post consecutive numbers (optionally as
//! arithmetic), one poster at a time.
//!
//! [`CountingState::apply`] is the pure transition function. Persistence,
//! per-channel serialisation and side effects (penalty role, reactions,
//! notices) live in the app layer.

pub mod expr;
pub mod numerals;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use expr::ExprError;

use crate::id::{ChannelId, CommunityId, RoleId, UserId};

/// Default duration of the penalty role handed out on a mistake.
pub const DEFAULT_PENALTY_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Persisted state of one counting channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingState {
    pub community: CommunityId,
    pub channel: ChannelId,
    pub current_number: u64,
    pub last_poster: Option<UserId>,
    pub penalty_role: Option<RoleId>,
    pub penalty_duration: Duration,
    pub reset_value: u64,
    pub enabled: bool,
    /// Incremented on every save; used for optimistic concurrency.
    pub version: u64,
}

/// Observable phase of a counting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingPhase {
    Active(u64),
    Disabled,
}

/// Result of feeding one message to [`CountingState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountOutcome {
    /// Channel disabled; nothing changed.
    Ignored,
    /// Same member posted twice in a row; the post must be removed.
    DoublePost,
    Correct { number: u64 },
    Mistake(CountMistake),
}

/// Details of a broken count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMistake {
    pub poster: UserId,
    pub expected: u64,
    /// Evaluated value, absent when the post did not parse.
    pub actual: Option<i64>,
    pub error: Option<ExprError>,
    pub reset_to: u64,
}

impl CountMistake {
    #[must_use]
    pub fn reason(&self) -> String {
        match (&self.error, self.actual) {
            (Some(err), _) => format!("invalid number ({err})"),
            (None, Some(actual)) => format!("expected {}, got {actual}", self.expected),
            (None, None) => format!("expected {}", self.expected),
        }
    }

    /// Public notice posted in the channel.
    #[must_use]
    pub fn notice(&self) -> String {
        format!(
            "<@{}> broke the count: {}. Counter reset to {}",
            self.poster,
            self.reason(),
            self.reset_to
        )
    }
}

impl CountingState {
    /// Fresh state for a newly configured channel: `Active(0)`.
    #[must_use]
    pub fn new(community: CommunityId, channel: ChannelId) -> Self {
        Self {
            community,
            channel,
            current_number: 0,
            last_poster: None,
            penalty_role: None,
            penalty_duration: DEFAULT_PENALTY_DURATION,
            reset_value: 0,
            enabled: true,
            version: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> CountingPhase {
        if self.enabled {
            CountingPhase::Active(self.current_number)
        } else {
            CountingPhase::Disabled
        }
    }

    #[must_use]
    pub fn expected(&self) -> u64 {
        self.current_number.saturating_add(1)
    }

    /// Apply a post from `poster` with raw `content`.
    pub fn apply(&mut self, poster: UserId, content: &str) -> CountOutcome {
        if !self.enabled {
            return CountOutcome::Ignored;
        }
        if self.last_poster == Some(poster) {
            return CountOutcome::DoublePost;
        }
        let expected = self.expected();
        let (actual, error) = match expr::evaluate(&numerals::normalize(content)) {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        if error.is_none() && actual.and_then(|v| u64::try_from(v).ok()) == Some(expected) {
            self.current_number = expected;
            self.last_poster = Some(poster);
            return CountOutcome::Correct { number: expected };
        }
        self.reset();
        CountOutcome::Mistake(CountMistake {
            poster,
            expected,
            actual,
            error,
            reset_to: self.current_number,
        })
    }

    /// Force the current number; the next expected post is `number + 1`.
    pub fn set_number(&mut self, number: u64) {
        self.current_number = number;
    }

    pub fn reset(&mut self) {
        self.current_number = self.reset_value;
        self.last_poster = None;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }
}
