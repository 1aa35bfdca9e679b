//! Platform side effects of each task kind.

use std::future::Future;
use std::sync::Arc;

use guildwarden_domain::error::{ValidationError, WardenError};
use guildwarden_domain::id::{CommunityId, RoleId, UserId};
use guildwarden_domain::task::{ScheduledTask, TaskPayload};

use super::TaskDispatcher;
use crate::executor::Executor;
use crate::ports::{
    DeferralRepository, MembershipApi, MessagingApi, RuleRepository, TaskLogStore, TaskRepository,
};
use crate::rule_engine::RuleEngine;

/// Re-attempts a deferred grant when its horizon task fires.
pub trait DeferralRecheck {
    fn recheck(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;
}

impl<T: DeferralRecheck + Send + Sync> DeferralRecheck for Arc<T> {
    fn recheck(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).recheck(community, member, role)
    }
}

impl<R, D, T, L, P> DeferralRecheck for RuleEngine<R, D, T, L, P>
where
    R: RuleRepository + Send + Sync,
    D: DeferralRepository + Send + Sync,
    T: TaskRepository + Send + Sync,
    L: TaskLogStore + Send + Sync,
    P: MembershipApi + Send + Sync,
{
    fn recheck(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        self.recheck_deferral(community, member, role)
    }
}

/// Dispatches tasks through the rate-limited executor.
pub struct PlatformDispatcher<P, G> {
    executor: Arc<Executor<P>>,
    deferrals: G,
}

impl<P, G> PlatformDispatcher<P, G> {
    pub fn new(executor: Arc<Executor<P>>, deferrals: G) -> Self {
        Self {
            executor,
            deferrals,
        }
    }
}

impl<P, G> PlatformDispatcher<P, G>
where
    P: MembershipApi + MessagingApi + Send + Sync,
    G: DeferralRecheck + Sync,
{
    async fn run(&self, task: &ScheduledTask) -> Result<(), WardenError> {
        match &task.payload {
            TaskPayload::Reminder {
                channel,
                user,
                message,
            } => {
                let text = format!("⏰ Reminder for <@{user}>: {message}");
                if let Some(channel) = channel {
                    match self.executor.send_message(*channel, &text).await {
                        Ok(_) => return Ok(()),
                        Err(err) => {
                            tracing::warn!(%channel, error = ?err, "reminder post failed, sending direct message");
                        }
                    }
                }
                self.executor.send_direct_message(*user, &text).await?;
            }
            TaskPayload::Timer {
                channel,
                user,
                label,
                message_id,
            } => {
                if let Some(countdown) = message_id
                    && let Err(err) = self
                        .executor
                        .edit_message(*channel, *countdown, "⏰ Timer finished")
                        .await
                {
                    tracing::debug!(error = ?err, "timer message no longer editable");
                }
                let suffix = label
                    .as_deref()
                    .map(|label| format!(" ({label})"))
                    .unwrap_or_default();
                self.executor
                    .send_message(*channel, &format!("⏰ Timer complete! <@{user}>{suffix}"))
                    .await?;
            }
            TaskPayload::Alarm { channel, message } => {
                self.executor.send_message(*channel, message).await?;
            }
            TaskPayload::PollClose {
                channel,
                message_id,
                question,
            } => {
                self.executor
                    .edit_message(*channel, *message_id, &format!("📊 Poll (CLOSED)\n{question}"))
                    .await?;
            }
            TaskPayload::PollRefresh {
                channel,
                message_id,
                content,
            } => {
                self.executor
                    .edit_message(*channel, *message_id, content)
                    .await?;
            }
            TaskPayload::RoleExpiry { member, role } => {
                let community = community_of(task)?;
                self.executor.revoke_role(community, *member, *role).await?;
                tracing::info!(%community, %member, %role, "timed role expired");
            }
            TaskPayload::DeferralRecheck { member, role } => {
                let community = community_of(task)?;
                self.deferrals.recheck(community, *member, *role).await?;
            }
        }
        Ok(())
    }
}

impl<P, G> TaskDispatcher for PlatformDispatcher<P, G>
where
    P: MembershipApi + MessagingApi + Send + Sync,
    G: DeferralRecheck + Sync,
{
    fn dispatch(
        &self,
        task: &ScheduledTask,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        self.run(task)
    }
}

fn community_of(task: &ScheduledTask) -> Result<CommunityId, WardenError> {
    task.community
        .ok_or_else(|| ValidationError::PayloadMismatch(task.kind.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorConfig, RetryConfig};
    use crate::testing::FakePlatform;
    use guildwarden_domain::event::Message;
    use guildwarden_domain::id::{ChannelId, MessageId};
    use guildwarden_domain::member::Member;
    use guildwarden_domain::time::now;
    use std::sync::Mutex;

    const GUILD: CommunityId = CommunityId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(7);
    const ALICE: UserId = UserId::new(3);

    #[derive(Default)]
    struct RecordingRecheck {
        seen: Mutex<Vec<(CommunityId, UserId, RoleId)>>,
    }

    impl DeferralRecheck for RecordingRecheck {
        fn recheck(
            &self,
            community: CommunityId,
            member: UserId,
            role: RoleId,
        ) -> impl Future<Output = Result<(), WardenError>> + Send {
            self.seen.lock().unwrap().push((community, member, role));
            async { Ok(()) }
        }
    }

    fn dispatcher() -> (
        PlatformDispatcher<Arc<FakePlatform>, Arc<RecordingRecheck>>,
        Arc<FakePlatform>,
        Arc<RecordingRecheck>,
    ) {
        let platform = Arc::new(FakePlatform::with_members([
            Member::new(ALICE, GUILD, now()).with_roles([RoleId::new(9)])
        ]));
        let recheck = Arc::new(RecordingRecheck::default());
        let executor = Arc::new(Executor::new(
            Arc::clone(&platform),
            ExecutorConfig {
                retry: RetryConfig::NO_RETRY,
                ..ExecutorConfig::default()
            },
        ));
        (
            PlatformDispatcher::new(executor, Arc::clone(&recheck)),
            platform,
            recheck,
        )
    }

    fn task(payload: TaskPayload) -> ScheduledTask {
        ScheduledTask::new(Some(GUILD), now(), payload)
    }

    #[tokio::test]
    async fn should_post_reminder_in_channel() {
        let (dispatcher, platform, _) = dispatcher();

        dispatcher
            .dispatch(&task(TaskPayload::Reminder {
                channel: Some(CHANNEL),
                user: ALICE,
                message: "water the plants".into(),
            }))
            .await
            .unwrap();

        let posted = platform.messages_in(CHANNEL);
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].content, "⏰ Reminder for <@3>: water the plants");
        assert!(platform.direct_messages().is_empty());
    }

    #[tokio::test]
    async fn should_fall_back_to_direct_message_when_channel_post_fails() {
        let (dispatcher, platform, _) = dispatcher();
        platform.forbid_channel(CHANNEL);

        dispatcher
            .dispatch(&task(TaskPayload::Reminder {
                channel: Some(CHANNEL),
                user: ALICE,
                message: "stretch".into(),
            }))
            .await
            .unwrap();

        assert_eq!(platform.direct_messages().len(), 1);
        assert_eq!(platform.direct_messages()[0].0, ALICE);
    }

    #[tokio::test]
    async fn should_mark_countdown_and_announce_when_timer_completes() {
        let (dispatcher, platform, _) = dispatcher();
        let countdown = Message {
            id: MessageId::new(40),
            community: GUILD,
            channel: CHANNEL,
            author: UserId::new(0),
            author_is_bot: true,
            content: "⏳ 5 minutes".into(),
            created_at: now(),
        };
        platform.seed_message(countdown);

        dispatcher
            .dispatch(&task(TaskPayload::Timer {
                channel: CHANNEL,
                user: ALICE,
                label: Some("tea".into()),
                message_id: Some(MessageId::new(40)),
            }))
            .await
            .unwrap();

        assert_eq!(
            platform.message(MessageId::new(40)).unwrap().content,
            "⏰ Timer finished"
        );
        assert!(
            platform
                .messages_in(CHANNEL)
                .iter()
                .any(|m| m.content == "⏰ Timer complete! <@3> (tea)")
        );
    }

    #[tokio::test]
    async fn should_fail_poll_close_when_poll_message_is_gone() {
        let (dispatcher, _, _) = dispatcher();

        let result = dispatcher
            .dispatch(&task(TaskPayload::PollClose {
                channel: CHANNEL,
                message_id: MessageId::new(77),
                question: "Lunch?".into(),
            }))
            .await;

        assert!(matches!(result, Err(WardenError::ExternalApi(_))));
    }

    #[tokio::test]
    async fn should_revoke_role_when_expiry_fires() {
        let (dispatcher, platform, _) = dispatcher();

        dispatcher
            .dispatch(&task(TaskPayload::RoleExpiry {
                member: ALICE,
                role: RoleId::new(9),
            }))
            .await
            .unwrap();

        assert!(!platform.member(GUILD, ALICE).has_role(RoleId::new(9)));
    }

    #[tokio::test]
    async fn should_forward_deferral_recheck() {
        let (dispatcher, _, recheck) = dispatcher();

        dispatcher
            .dispatch(&task(TaskPayload::DeferralRecheck {
                member: ALICE,
                role: RoleId::new(12),
            }))
            .await
            .unwrap();

        assert_eq!(
            *recheck.seen.lock().unwrap(),
            vec![(GUILD, ALICE, RoleId::new(12))]
        );
    }
}
