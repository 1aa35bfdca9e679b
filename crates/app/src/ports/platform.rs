//! Chat platform ports — the external API every side effect goes through.
//!
//! Implementations report failures as [`WardenError::ExternalApi`] so the
//! executor can tell transient errors (rate limits, network) from permanent
//! ones (missing permission, unknown object).

use std::future::Future;
use std::sync::Arc;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::event::Message;
use guildwarden_domain::id::{ChannelId, CommunityId, MessageId, RoleId, UserId};
use guildwarden_domain::member::Member;

/// Role and member operations.
pub trait MembershipApi {
    fn grant_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;

    fn revoke_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;

    fn get_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> impl Future<Output = Result<Option<Member>, WardenError>> + Send;

    fn list_members(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<Member>, WardenError>> + Send;
}

/// Message operations.
pub trait MessagingApi {
    fn send_message(
        &self,
        channel: ChannelId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, WardenError>> + Send;

    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;

    fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;

    fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: String,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;

    fn send_direct_message(
        &self,
        user: UserId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, WardenError>> + Send;

    /// Up to `limit` most recent messages of `channel`, in no particular order.
    fn fetch_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>, WardenError>> + Send;
}

impl<T: MembershipApi + Send + Sync> MembershipApi for Arc<T> {
    fn grant_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).grant_role(community, member, role)
    }

    fn revoke_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).revoke_role(community, member, role)
    }

    fn get_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> impl Future<Output = Result<Option<Member>, WardenError>> + Send {
        (**self).get_member(community, member)
    }

    fn list_members(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<Member>, WardenError>> + Send {
        (**self).list_members(community)
    }
}

impl<T: MessagingApi + Send + Sync> MessagingApi for Arc<T> {
    fn send_message(
        &self,
        channel: ChannelId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, WardenError>> + Send {
        (**self).send_message(channel, content)
    }

    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).edit_message(channel, message, content)
    }

    fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).delete_message(channel, message)
    }

    fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: String,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).add_reaction(channel, message, emoji)
    }

    fn send_direct_message(
        &self,
        user: UserId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, WardenError>> + Send {
        (**self).send_direct_message(user, content)
    }

    fn fetch_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>, WardenError>> + Send {
        (**self).fetch_history(channel, limit)
    }
}
