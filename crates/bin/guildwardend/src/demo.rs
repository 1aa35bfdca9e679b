//! Demo community seeded on startup: a handful of members and channels on the
//! virtual platform, plus one rule of each kind in the store.

use std::time::Duration;

use guildwarden_app::counting_engine::{CountingEngine, CountingSettings};
use guildwarden_app::ports::{
    CountingRepository, EventPublisher, MembershipApi, MessagingApi, MirrorRepository,
    RuleRepository, TaskLogStore, TaskRepository,
};
use guildwarden_app::scheduler::{Scheduler, TaskDispatcher};
use guildwarden_app::services::{MirrorLinkService, RuleService};
use guildwarden_adapter_virtual::InMemoryPlatform;
use guildwarden_domain::automation::RestrictionScope;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{ChannelId, CommunityId, RoleId, UserId};
use guildwarden_domain::member::Member;
use guildwarden_domain::task::{Recurrence, ScheduledTask, TaskPayload};
use guildwarden_domain::time::{delta, now};

pub const COMMUNITY: CommunityId = CommunityId::new(1);
pub const BOT: UserId = UserId::new(1);

pub const GENERAL: ChannelId = ChannelId::new(10);
pub const COUNTING: ChannelId = ChannelId::new(11);
pub const ANNOUNCEMENTS: ChannelId = ChannelId::new(12);
pub const ARCHIVE: ChannelId = ChannelId::new(13);

const VERIFIED: RoleId = RoleId::new(100);
const MEMBER: RoleId = RoleId::new(101);
const UNVERIFIED: RoleId = RoleId::new(102);
const MUTED: RoleId = RoleId::new(103);

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Register the demo channels and members.
pub fn populate<E: EventPublisher + Send + Sync>(platform: &InMemoryPlatform<E>) {
    for channel in [GENERAL, COUNTING, ANNOUNCEMENTS, ARCHIVE] {
        platform.add_channel(COMMUNITY, channel);
    }
    let joined = now();
    let mut bot = Member::new(BOT, COMMUNITY, joined);
    bot.is_bot = true;
    platform.add_member(bot);
    platform.add_member(Member::new(UserId::new(2), COMMUNITY, joined).with_roles([UNVERIFIED]));
    platform.add_member(Member::new(UserId::new(3), COMMUNITY, joined).with_roles([VERIFIED]));
    platform.add_member(Member::new(UserId::new(4), COMMUNITY, joined).with_roles([MUTED]));
}

/// Store the demo rules and mirror link unless a previous run already did.
///
/// # Errors
///
/// Returns a storage error.
pub async fn seed_rules<R, M>(
    rules: &RuleService<R>,
    links: &MirrorLinkService<M>,
) -> Result<(), WardenError>
where
    R: RuleRepository,
    M: MirrorRepository,
{
    if rules.list_rules(COMMUNITY).await?.is_empty() {
        rules
            .create_autorole(
                COMMUNITY,
                "verified members",
                VERIFIED,
                &MEMBER.to_string(),
                &UNVERIFIED.to_string(),
            )
            .await?;
        rules
            .set_conditional(COMMUNITY, MEMBER, &MUTED.to_string(), "")
            .await?;
        rules
            .add_restriction(COMMUNITY, GENERAL, MEMBER, RestrictionScope::Messages, None)
            .await?;
    }
    if links.list_links(COMMUNITY).await?.is_empty() {
        links
            .create_link(COMMUNITY, ANNOUNCEMENTS, ARCHIVE)
            .await?;
    }
    Ok(())
}

/// Turn on the counting channel and schedule a daily check-in alarm.
///
/// # Errors
///
/// Returns a storage error or a state conflict on the counting channel.
pub async fn seed_activities<C, T, P, L, D>(
    counting: &CountingEngine<C, T, P>,
    scheduler: &Scheduler<T, L, D>,
) -> Result<(), WardenError>
where
    C: CountingRepository + Sync,
    T: TaskRepository + Clone + Send + Sync + 'static,
    P: MembershipApi + MessagingApi + Sync,
    L: TaskLogStore + Clone + Send + Sync + 'static,
    D: TaskDispatcher + Send + Sync + 'static,
{
    if counting.state(COUNTING).await?.is_none() {
        counting
            .configure(
                COMMUNITY,
                COUNTING,
                CountingSettings {
                    penalty_role: Some(Some(MUTED)),
                    penalty_duration: Some(Duration::from_secs(10 * 60)),
                    reset_value: None,
                },
            )
            .await?;
    }
    if scheduler.pending().await?.is_empty() {
        let alarm = ScheduledTask::new(
            Some(COMMUNITY),
            now() + delta(Duration::from_secs(60)),
            TaskPayload::Alarm {
                channel: GENERAL,
                message: "Daily check-in: how is everyone doing?".to_string(),
            },
        )
        .with_recurrence(Recurrence::interval(DAY, Some("UTC".to_string()))?);
        scheduler.schedule(alarm).await?;
    }
    Ok(())
}
