//! Counting engine — persisted, per-channel serialized counting game.
//!
//! The transition itself is [`CountingState::apply`]; this service loads the
//! channel state, applies the post under the channel lock, saves it with an
//! optimistic version check and then performs the visible side effects
//! (reaction, notice, penalty role).

use std::sync::Arc;
use std::time::Duration;

use guildwarden_domain::counting::{CountMistake, CountOutcome, CountingState};
use guildwarden_domain::error::{NotFoundError, StateConflictError, ValidationError, WardenError};
use guildwarden_domain::event::Message;
use guildwarden_domain::id::{ChannelId, CommunityId, RoleId};
use guildwarden_domain::task::{ScheduledTask, TaskPayload};
use guildwarden_domain::time::{delta, now};

use crate::executor::Executor;
use crate::keyed::KeyedLocks;
use crate::ports::{CountingRepository, MembershipApi, MessagingApi, TaskRepository};

/// Versioned saves attempted before giving up with a state conflict.
pub const MAX_SAVE_ATTEMPTS: u32 = 3;

const CORRECT_REACTION: &str = "✅";
const MISTAKE_REACTION: &str = "❌";

/// Settings accepted by [`CountingEngine::configure`]. `None` keeps the
/// current value (or the default for a new channel).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountingSettings {
    /// `Some(None)` clears the penalty role.
    pub penalty_role: Option<Option<RoleId>>,
    pub penalty_duration: Option<Duration>,
    pub reset_value: Option<u64>,
}

/// Serialized counting service shared by every counting channel.
pub struct CountingEngine<C, T, P> {
    states: C,
    tasks: T,
    executor: Arc<Executor<P>>,
    channel_locks: KeyedLocks<ChannelId>,
}

impl<C, T, P> CountingEngine<C, T, P>
where
    C: CountingRepository + Sync,
    T: TaskRepository + Sync,
    P: MembershipApi + MessagingApi + Sync,
{
    pub fn new(states: C, tasks: T, executor: Arc<Executor<P>>) -> Self {
        Self {
            states,
            tasks,
            executor,
            channel_locks: KeyedLocks::new(),
        }
    }

    /// Feed a freshly posted message to its channel's counter.
    ///
    /// Messages from bots and in unconfigured channels are ignored. Side
    /// effect failures are logged; the persisted state is authoritative.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or [`WardenError::StateConflict`] when the
    /// versioned save keeps losing.
    #[tracing::instrument(skip(self, message), fields(channel = %message.channel, poster = %message.author))]
    pub async fn handle_message(&self, message: &Message) -> Result<CountOutcome, WardenError> {
        if message.author_is_bot {
            return Ok(CountOutcome::Ignored);
        }
        let outcome = {
            let _guard = self.channel_locks.lock(message.channel).await;
            let mut outcome = CountOutcome::Ignored;
            let updated = self
                .update(message.channel, |state| {
                    outcome = state.apply(message.author, &message.content);
                    matches!(outcome, CountOutcome::Correct { .. } | CountOutcome::Mistake(_))
                })
                .await?;
            if updated.is_none() {
                return Ok(CountOutcome::Ignored);
            }
            outcome
        };

        match &outcome {
            CountOutcome::Ignored => {}
            CountOutcome::DoublePost => {
                tracing::debug!("double post removed");
                if let Err(err) = self
                    .executor
                    .delete_message(message.channel, message.id)
                    .await
                {
                    tracing::warn!(error = ?err, "failed to remove double post");
                }
            }
            CountOutcome::Correct { .. } => {
                self.react(message, CORRECT_REACTION).await;
            }
            CountOutcome::Mistake(mistake) => {
                self.on_mistake(message, mistake).await?;
            }
        }
        Ok(outcome)
    }

    /// Create the channel's counter (`Active(0)`) or change its settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroDuration`] for a zero penalty duration,
    /// a storage error, or a state conflict.
    #[tracing::instrument(skip(self))]
    pub async fn configure(
        &self,
        community: CommunityId,
        channel: ChannelId,
        settings: CountingSettings,
    ) -> Result<CountingState, WardenError> {
        if settings.penalty_duration == Some(Duration::ZERO) {
            return Err(ValidationError::ZeroDuration.into());
        }
        let _guard = self.channel_locks.lock(channel).await;
        for _ in 0..MAX_SAVE_ATTEMPTS {
            let current = self.states.get(channel).await?;
            let expected_version = current.as_ref().map_or(0, |s| s.version);
            let mut state = current.unwrap_or_else(|| CountingState::new(community, channel));
            if let Some(role) = settings.penalty_role {
                state.penalty_role = role;
            }
            if let Some(duration) = settings.penalty_duration {
                state.penalty_duration = duration;
            }
            if let Some(value) = settings.reset_value {
                state.reset_value = value;
            }
            state.version = expected_version + 1;
            if self
                .states
                .save_if_version(state.clone(), expected_version)
                .await?
            {
                tracing::info!(%community, %channel, "counting channel configured");
                return Ok(state);
            }
        }
        Err(conflict(channel))
    }

    /// Force the current number; the next expected post is `number + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] for an unconfigured channel, a
    /// storage error or a state conflict.
    pub async fn set_number(
        &self,
        channel: ChannelId,
        number: u64,
    ) -> Result<CountingState, WardenError> {
        self.admin(channel, |state| state.set_number(number)).await
    }

    /// Back to the reset value with no last poster.
    ///
    /// # Errors
    ///
    /// See [`CountingEngine::set_number`].
    pub async fn reset(&self, channel: ChannelId) -> Result<CountingState, WardenError> {
        self.admin(channel, CountingState::reset).await
    }

    /// # Errors
    ///
    /// See [`CountingEngine::set_number`].
    pub async fn disable(&self, channel: ChannelId) -> Result<CountingState, WardenError> {
        self.admin(channel, CountingState::disable).await
    }

    /// Re-enable a channel, keeping its current number.
    ///
    /// # Errors
    ///
    /// See [`CountingEngine::set_number`].
    pub async fn enable(&self, channel: ChannelId) -> Result<CountingState, WardenError> {
        self.admin(channel, CountingState::enable).await
    }

    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn state(&self, channel: ChannelId) -> Result<Option<CountingState>, WardenError> {
        self.states.get(channel).await
    }

    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn channels(&self, community: CommunityId) -> Result<Vec<CountingState>, WardenError> {
        self.states.list_for_community(community).await
    }

    /// Stop counting in `channel` and forget its state.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn remove(&self, channel: ChannelId) -> Result<bool, WardenError> {
        let _guard = self.channel_locks.lock(channel).await;
        self.states.delete(channel).await
    }

    #[tracing::instrument(skip(self, change))]
    async fn admin(
        &self,
        channel: ChannelId,
        mut change: impl FnMut(&mut CountingState),
    ) -> Result<CountingState, WardenError> {
        let _guard = self.channel_locks.lock(channel).await;
        self.update(channel, |state| {
            change(state);
            true
        })
        .await?
        .ok_or_else(|| {
            NotFoundError {
                entity: "CountingChannel",
                id: channel.to_string(),
            }
            .into()
        })
    }

    /// Load, change and save with a version check. `change` returns whether
    /// the state must be written. `None` when the channel is not configured.
    async fn update(
        &self,
        channel: ChannelId,
        mut change: impl FnMut(&mut CountingState) -> bool,
    ) -> Result<Option<CountingState>, WardenError> {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let Some(mut state) = self.states.get(channel).await? else {
                return Ok(None);
            };
            let expected_version = state.version;
            if !change(&mut state) {
                return Ok(Some(state));
            }
            state.version = expected_version + 1;
            if self
                .states
                .save_if_version(state.clone(), expected_version)
                .await?
            {
                return Ok(Some(state));
            }
            tracing::debug!(%channel, attempt, "counting state changed concurrently, retrying");
        }
        Err(conflict(channel))
    }

    async fn on_mistake(&self, message: &Message, mistake: &CountMistake) -> Result<(), WardenError> {
        tracing::info!(
            channel = %message.channel,
            poster = %mistake.poster,
            expected = mistake.expected,
            actual = ?mistake.actual,
            reset_to = mistake.reset_to,
            "count broken"
        );
        self.react(message, MISTAKE_REACTION).await;
        if let Err(err) = self
            .executor
            .send_message(message.channel, &mistake.notice())
            .await
        {
            tracing::warn!(error = ?err, "failed to post count notice");
        }

        let Some(state) = self.states.get(message.channel).await? else {
            return Ok(());
        };
        let Some(role) = state.penalty_role else {
            return Ok(());
        };
        match self
            .executor
            .grant_role(message.community, mistake.poster, role)
            .await
        {
            Ok(()) => {
                let expiry = ScheduledTask::new(
                    Some(message.community),
                    now() + delta(state.penalty_duration),
                    TaskPayload::RoleExpiry {
                        member: mistake.poster,
                        role,
                    },
                );
                self.tasks.create(expiry).await?;
            }
            Err(err) => {
                tracing::warn!(%role, error = ?err, "failed to apply counting penalty");
            }
        }
        Ok(())
    }

    async fn react(&self, message: &Message, emoji: &str) {
        if let Err(err) = self
            .executor
            .add_reaction(message.channel, message.id, emoji)
            .await
        {
            tracing::warn!(error = ?err, emoji, "failed to react");
        }
    }
}

fn conflict(channel: ChannelId) -> WardenError {
    StateConflictError {
        resource: "counting_state",
        key: channel.to_string(),
        attempts: MAX_SAVE_ATTEMPTS,
    }
    .into()
}
