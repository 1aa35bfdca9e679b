//! # guildwarden-adapter-virtual
//!
//! Virtual chat platform that keeps communities, members and messages in
//! memory. Used by the daemon's demo mode and by end-to-end tests.
//!
//! ## Behaviour
//!
//! | Action | Effect | Published event |
//! |--------|--------|-----------------|
//! | `grant_role` / `assign_role` | role added to the member | `MemberEvent` (added), only if the role was missing |
//! | `revoke_role` / `unassign_role` | role removed | `MemberEvent` (removed), only if the role was held |
//! | `send_message` / `post` | message stored in the channel | `MessageEvent::Created` |
//! | `edit_message` / `edit` | content replaced | `MessageEvent::Edited` |
//! | `delete_message` / `remove` | message dropped | `MessageEvent::Deleted` |
//!
//! Port calls act as the bot; the `assign_role`, `post`, ... helpers act as
//! the community's users and moderators. Protected roles refuse bot grants
//! with a permanent `Forbidden` error, as a real platform does for roles
//! ranked above the bot.
//!
//! ## Dependency rule
//!
//! Depends on `guildwarden-app` (port traits) and `guildwarden-domain` only.

mod world;

use std::sync::{Mutex, MutexGuard, PoisonError};

use guildwarden_app::ports::{EventPublisher, MembershipApi, MessagingApi};
use guildwarden_domain::error::WardenError;
use guildwarden_domain::event::{InboundEvent, MemberEvent, Message, MessageEvent};
use guildwarden_domain::id::{ChannelId, CommunityId, MessageId, RoleId, UserId};
use guildwarden_domain::member::Member;

use world::World;

/// In-memory chat platform publishing every change on `E`.
pub struct InMemoryPlatform<E> {
    bot: UserId,
    world: Mutex<World>,
    events: E,
}

#[derive(Clone, Copy)]
enum Actor {
    Bot,
    Moderator,
}

impl<E: EventPublisher + Send + Sync> InMemoryPlatform<E> {
    /// Create an empty platform where `bot` is the automation's own account.
    #[must_use]
    pub fn new(bot: UserId, events: E) -> Self {
        Self {
            bot,
            world: Mutex::new(World::default()),
            events,
        }
    }

    #[must_use]
    pub fn bot_id(&self) -> UserId {
        self.bot
    }

    pub fn add_channel(&self, community: CommunityId, channel: ChannelId) {
        self.lock().channels.insert(channel, community);
    }

    /// Register a member as-is. Joining does not publish role events.
    pub fn add_member(&self, member: Member) {
        self.lock()
            .members
            .insert((member.community, member.id), member);
    }

    /// Make `role` ungrantable by the bot.
    pub fn protect_role(&self, role: RoleId) {
        self.lock().protected_roles.insert(role);
    }

    #[must_use]
    pub fn member(&self, community: CommunityId, user: UserId) -> Option<Member> {
        self.lock().members.get(&(community, user)).cloned()
    }

    /// Messages of `channel` in posting order.
    #[must_use]
    pub fn messages_in(&self, channel: ChannelId) -> Vec<Message> {
        self.lock()
            .messages
            .get(&channel)
            .map(|messages| messages.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.lock().direct_messages.clone()
    }

    #[must_use]
    pub fn reactions_on(&self, message: MessageId) -> Vec<String> {
        self.lock()
            .reactions
            .iter()
            .filter(|(id, _)| *id == message)
            .map(|(_, emoji)| emoji.clone())
            .collect()
    }

    /// A moderator gives `role` to a member.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::ExternalApi`] for an unknown member, or the
    /// publisher's error.
    pub async fn assign_role(
        &self,
        community: CommunityId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.change_role(Actor::Moderator, community, user, role, true)
            .await
    }

    /// A moderator takes `role` away from a member.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::ExternalApi`] for an unknown member, or the
    /// publisher's error.
    pub async fn unassign_role(
        &self,
        community: CommunityId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.change_role(Actor::Moderator, community, user, role, false)
            .await
    }

    /// A user posts in `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::ExternalApi`] for an unknown channel, or the
    /// publisher's error.
    pub async fn post(
        &self,
        channel: ChannelId,
        author: UserId,
        content: impl Into<String>,
    ) -> Result<Message, WardenError> {
        let message = {
            let mut world = self.lock();
            let community = world.community_of(channel)?;
            let is_bot = world
                .members
                .get(&(community, author))
                .is_some_and(|m| m.is_bot);
            world.post(channel, author, is_bot, content.into())?
        };
        self.events
            .publish(InboundEvent::Message(MessageEvent::Created(message.clone())))
            .await?;
        Ok(message)
    }

    /// A user edits one of their messages.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::ExternalApi`] for an unknown message, or the
    /// publisher's error.
    pub async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: impl Into<String>,
    ) -> Result<(), WardenError> {
        self.replace_content(channel, message, content.into()).await
    }

    /// A user deletes a message.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::ExternalApi`] for an unknown message, or the
    /// publisher's error.
    pub async fn remove(&self, channel: ChannelId, message: MessageId) -> Result<(), WardenError> {
        self.drop_message(channel, message).await
    }

    async fn change_role(
        &self,
        actor: Actor,
        community: CommunityId,
        user: UserId,
        role: RoleId,
        add: bool,
    ) -> Result<(), WardenError> {
        let changed = {
            let mut world = self.lock();
            if matches!(actor, Actor::Bot) {
                world.check_role(role)?;
            }
            let member = world.member_mut(community, user)?;
            let changed = if add {
                member.roles.insert(role)
            } else {
                member.roles.remove(&role)
            };
            changed.then(|| member.clone())
        };

        let Some(snapshot) = changed else {
            return Ok(());
        };
        tracing::debug!(%community, member = %user, %role, add, "role changed");
        let event = if add {
            MemberEvent::role_added(snapshot, role)
        } else {
            MemberEvent::role_removed(snapshot, role)
        };
        self.events.publish(InboundEvent::Member(event)).await
    }

    async fn replace_content(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> Result<(), WardenError> {
        let (community, author) = {
            let mut world = self.lock();
            let stored = world.message_mut(channel, message)?;
            stored.content.clone_from(&content);
            (stored.community, stored.author)
        };
        self.events
            .publish(InboundEvent::Message(MessageEvent::Edited {
                community,
                channel,
                message,
                author,
                content,
            }))
            .await
    }

    async fn drop_message(&self, channel: ChannelId, message: MessageId) -> Result<(), WardenError> {
        let removed = self.lock().remove_message(channel, message)?;
        self.events
            .publish(InboundEvent::Message(MessageEvent::Deleted {
                community: removed.community,
                channel,
                message,
            }))
            .await
    }

    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: EventPublisher + Send + Sync> MembershipApi for InMemoryPlatform<E> {
    async fn grant_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.change_role(Actor::Bot, community, member, role, true)
            .await
    }

    async fn revoke_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.change_role(Actor::Bot, community, member, role, false)
            .await
    }

    async fn get_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> Result<Option<Member>, WardenError> {
        Ok(self.member(community, member))
    }

    async fn list_members(&self, community: CommunityId) -> Result<Vec<Member>, WardenError> {
        let mut members: Vec<Member> = self
            .lock()
            .members
            .values()
            .filter(|m| m.community == community)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.id);
        Ok(members)
    }
}

impl<E: EventPublisher + Send + Sync> MessagingApi for InMemoryPlatform<E> {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: String,
    ) -> Result<MessageId, WardenError> {
        let message = self.lock().post(channel, self.bot, true, content)?;
        let id = message.id;
        self.events
            .publish(InboundEvent::Message(MessageEvent::Created(message)))
            .await?;
        Ok(id)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> Result<(), WardenError> {
        self.replace_content(channel, message, content).await
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), WardenError> {
        self.drop_message(channel, message).await
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: String,
    ) -> Result<(), WardenError> {
        let mut world = self.lock();
        world.message_mut(channel, message)?;
        world.reactions.push((message, emoji));
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user: UserId,
        content: String,
    ) -> Result<MessageId, WardenError> {
        let mut world = self.lock();
        let id = world.next_direct_id();
        world.direct_messages.push((user, content));
        Ok(id)
    }

    async fn fetch_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, WardenError> {
        let world = self.lock();
        world.community_of(channel)?;
        Ok(world
            .messages
            .get(&channel)
            .map(|messages| messages.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
