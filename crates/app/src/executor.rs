//! Side-effect executor — every call to the chat platform goes through here.
//!
//! Calls draw from a global token bucket, are bounded by a per-call timeout
//! and are retried with exponential backoff when the failure is transient
//! (rate limit, network, timeout). Permanent failures return immediately.

mod budget;
mod retry;

pub use budget::RateBudget;
pub use retry::RetryConfig;

use std::future::Future;
use std::time::Duration;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::event::Message;
use guildwarden_domain::id::{ChannelId, CommunityId, MessageId, RoleId, UserId};
use guildwarden_domain::member::Member;

use crate::ports::{MembershipApi, MessagingApi};

/// Tuning knobs for [`Executor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorConfig {
    pub retry: RetryConfig,
    /// Token bucket size.
    pub burst: u32,
    pub refill_per_sec: u32,
    pub call_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::DEFAULT,
            burst: 10,
            refill_per_sec: 5,
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Rate-limited, retrying wrapper around a platform implementation.
pub struct Executor<P> {
    platform: P,
    budget: RateBudget,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl<P> Executor<P> {
    #[must_use]
    pub fn new(platform: P, config: ExecutorConfig) -> Self {
        Self {
            platform,
            budget: RateBudget::new(config.burst, config.refill_per_sec),
            retry: config.retry,
            call_timeout: config.call_timeout,
        }
    }

    /// Direct access to the wrapped platform, bypassing budget and retries.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    async fn call<T, F, Fut>(&self, op: &'static str, mut operation: F) -> Result<T, WardenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WardenError>>,
    {
        let mut attempt = 0;
        loop {
            self.budget.acquire().await;
            let err = match tokio::time::timeout(self.call_timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => WardenError::Timeout(self.call_timeout),
            };
            if !err.is_transient() || attempt >= self.retry.max_retries {
                if attempt > 0 {
                    tracing::warn!(op, attempts = attempt + 1, error = ?err, "platform call failed after retries");
                }
                return Err(err);
            }
            let delay = self
                .retry
                .delay_for_attempt(attempt)
                .max(err.retry_after().unwrap_or_default());
            tracing::debug!(op, attempt, ?delay, error = ?err, "retrying platform call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl<P: MembershipApi + Sync> Executor<P> {
    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn grant_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.call("grant_role", || self.platform.grant_role(community, member, role))
            .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn revoke_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.call("revoke_role", || self.platform.revoke_role(community, member, role))
            .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn get_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> Result<Option<Member>, WardenError> {
        self.call("get_member", || self.platform.get_member(community, member))
            .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn list_members(&self, community: CommunityId) -> Result<Vec<Member>, WardenError> {
        self.call("list_members", || self.platform.list_members(community))
            .await
    }
}

impl<P: MessagingApi + Sync> Executor<P> {
    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, WardenError> {
        self.call("send_message", || {
            self.platform.send_message(channel, content.to_string())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), WardenError> {
        self.call("edit_message", || {
            self.platform.edit_message(channel, message, content.to_string())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), WardenError> {
        self.call("delete_message", || self.platform.delete_message(channel, message))
            .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), WardenError> {
        self.call("add_reaction", || {
            self.platform.add_reaction(channel, message, emoji.to_string())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn send_direct_message(
        &self,
        user: UserId,
        content: &str,
    ) -> Result<MessageId, WardenError> {
        self.call("send_direct_message", || {
            self.platform.send_direct_message(user, content.to_string())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the last platform error once retries are exhausted.
    pub async fn fetch_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, WardenError> {
        self.call("fetch_history", || self.platform.fetch_history(channel, limit))
            .await
    }
}

/// Whether `err` came from the platform call itself rather than storage.
pub(crate) fn is_side_effect_failure(err: &WardenError) -> bool {
    matches!(err, WardenError::ExternalApi(_) | WardenError::Timeout(_))
}

/// One-line error text including the source, for task log entries.
pub(crate) fn describe(err: &WardenError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;
    use guildwarden_domain::error::ExternalApiError;

    fn executor() -> Executor<FakePlatform> {
        let member = Member::new(UserId::new(1), CommunityId::new(1), guildwarden_domain::time::now());
        Executor::new(FakePlatform::with_members([member]), ExecutorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_transient_failures_until_success() {
        let exec = executor();
        exec.platform()
            .fail_next("grant_role", ExternalApiError::Network("reset".into()));
        exec.platform()
            .fail_next("grant_role", ExternalApiError::RateLimited { retry_after: None });

        exec.grant_role(CommunityId::new(1), UserId::new(1), RoleId::new(5))
            .await
            .unwrap();

        assert_eq!(exec.platform().calls("grant_role"), 3);
        assert!(exec.platform().member(CommunityId::new(1), UserId::new(1)).has_role(RoleId::new(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_retry_permanent_failures() {
        let exec = executor();
        exec.platform()
            .fail_next("grant_role", ExternalApiError::Forbidden("manage roles".into()));

        let result = exec
            .grant_role(CommunityId::new(1), UserId::new(1), RoleId::new(5))
            .await;

        assert!(matches!(
            result,
            Err(WardenError::ExternalApi(ExternalApiError::Forbidden(_)))
        ));
        assert_eq!(exec.platform().calls("grant_role"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_up_after_max_retries() {
        let exec = executor();
        for _ in 0..10 {
            exec.platform()
                .fail_next("send_message", ExternalApiError::Network("down".into()));
        }

        let result = exec.send_message(ChannelId::new(9), "hello").await;

        assert!(result.is_err());
        assert_eq!(
            exec.platform().calls("send_message"),
            RetryConfig::DEFAULT.max_retries as usize + 1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_honour_retry_after_from_rate_limit() {
        let exec = executor();
        exec.platform().fail_next(
            "send_message",
            ExternalApiError::RateLimited {
                retry_after: Some(Duration::from_secs(7)),
            },
        );
        let start = tokio::time::Instant::now();

        exec.send_message(ChannelId::new(9), "hello").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(7));
    }
}
