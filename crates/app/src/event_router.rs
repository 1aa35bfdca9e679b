//! Event router — fans inbound events out to the engines.
//!
//! Message events are serialized per channel (counting then mirroring, in
//! arrival order); member events per member. Different keys run
//! concurrently on the shared worker budget.
//!
//! Events the router was too slow to read off the bus are gone; the router
//! counts them in [`EventRouter::missed_events`] and logs the running total.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use guildwarden_domain::counting::CountOutcome;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::event::{InboundEvent, MemberEvent, MessageEvent};
use guildwarden_domain::id::{ChannelId, CommunityId, UserId};

use crate::counting_engine::CountingEngine;
use crate::keyed::KeyedSerializer;
use crate::mirror_engine::MirrorEngine;
use crate::ports::{
    CountingRepository, DeferralRepository, MembershipApi, MessagingApi, MirrorRepository,
    RuleRepository, TaskLogStore, TaskRepository,
};
use crate::rule_engine::RuleEngine;

/// Consumer of member role changes.
pub trait MemberEventHandler {
    fn on_member_event(
        &self,
        event: &MemberEvent,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;
}

/// Consumer of message lifecycle events.
pub trait MessageEventHandler {
    fn on_message_event(
        &self,
        event: &MessageEvent,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;
}

impl<R, D, T, L, P> MemberEventHandler for RuleEngine<R, D, T, L, P>
where
    R: RuleRepository + Send + Sync,
    D: DeferralRepository + Send + Sync,
    T: TaskRepository + Send + Sync,
    L: TaskLogStore + Send + Sync,
    P: MembershipApi + Send + Sync,
{
    async fn on_member_event(&self, event: &MemberEvent) -> Result<(), WardenError> {
        let report = self.evaluate(event).await?;
        if report.failed > 0 {
            tracing::warn!(failed = report.failed, "some role changes were rejected");
        }
        Ok(())
    }
}

impl<C, T, P> MessageEventHandler for CountingEngine<C, T, P>
where
    C: CountingRepository + Send + Sync,
    T: TaskRepository + Send + Sync,
    P: MembershipApi + MessagingApi + Send + Sync,
{
    async fn on_message_event(&self, event: &MessageEvent) -> Result<(), WardenError> {
        if let MessageEvent::Created(message) = event
            && let CountOutcome::Mistake(mistake) = self.handle_message(message).await?
        {
            tracing::debug!(reason = %mistake.reason(), "count reset");
        }
        Ok(())
    }
}

impl<M, P> MessageEventHandler for MirrorEngine<M, P>
where
    M: MirrorRepository + Send + Sync,
    P: MessagingApi + Send + Sync,
{
    async fn on_message_event(&self, event: &MessageEvent) -> Result<(), WardenError> {
        self.handle(event).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RouteKey {
    Channel(ChannelId),
    Member(CommunityId, UserId),
}

/// Routes [`InboundEvent`]s to the rule, counting and mirror engines.
pub struct EventRouter<R, C, M> {
    rules: Arc<R>,
    counting: Arc<C>,
    mirror: Arc<M>,
    serializer: KeyedSerializer<RouteKey>,
    missed: AtomicU64,
}

impl<R, C, M> EventRouter<R, C, M>
where
    R: MemberEventHandler + Send + Sync + 'static,
    C: MessageEventHandler + Send + Sync + 'static,
    M: MessageEventHandler + Send + Sync + 'static,
{
    /// `workers` bounds how many keys are processed at the same time.
    #[must_use]
    pub fn new(rules: Arc<R>, counting: Arc<C>, mirror: Arc<M>, workers: usize) -> Self {
        Self {
            rules,
            counting,
            mirror,
            serializer: KeyedSerializer::new(workers),
            missed: AtomicU64::new(0),
        }
    }

    /// Queue `event` behind earlier events with the same key.
    pub fn route(&self, event: InboundEvent) {
        match event {
            InboundEvent::Member(event) => {
                let key = RouteKey::Member(event.community(), event.member.id);
                let rules = Arc::clone(&self.rules);
                self.serializer.submit(key, async move {
                    if let Err(err) = rules.on_member_event(&event).await {
                        tracing::error!(member = %event.member.id, error = ?err, "member event failed");
                    }
                });
            }
            InboundEvent::Message(event) => {
                let key = RouteKey::Channel(event.channel());
                let counting = Arc::clone(&self.counting);
                let mirror = Arc::clone(&self.mirror);
                self.serializer.submit(key, async move {
                    if let Err(err) = counting.on_message_event(&event).await {
                        tracing::error!(channel = %event.channel(), error = ?err, "counting failed");
                    }
                    if let Err(err) = mirror.on_message_event(&event).await {
                        tracing::error!(channel = %event.channel(), error = ?err, "mirroring failed");
                    }
                });
            }
        }
    }

    /// Wait until every event routed so far for `channel` is processed.
    pub async fn flush_channel(&self, channel: ChannelId) {
        self.serializer.flush(RouteKey::Channel(channel)).await;
    }

    /// Wait until every event routed so far for the member is processed.
    pub async fn flush_member(&self, community: CommunityId, member: UserId) {
        self.serializer
            .flush(RouteKey::Member(community, member))
            .await;
    }

    /// Bus events dropped because the router fell more than the bus capacity
    /// behind. Counting and mirroring never saw them.
    #[must_use]
    pub fn missed_events(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    /// Route events from the bus until it closes or `shutdown` resolves.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<InboundEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                received = events.recv() => match received {
                    Ok(event) => self.route(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        let total = self.missed.fetch_add(missed, Ordering::Relaxed) + missed;
                        tracing::error!(
                            missed,
                            total,
                            "event router fell behind the bus; events dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::info!("event router stopped");
    }
}
