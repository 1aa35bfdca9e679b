//! Platform state: members, channels and the messages they hold.

use std::collections::{BTreeMap, HashMap, HashSet};

use guildwarden_domain::error::ExternalApiError;
use guildwarden_domain::event::Message;
use guildwarden_domain::id::{ChannelId, CommunityId, MessageId, RoleId, UserId};
use guildwarden_domain::member::Member;
use guildwarden_domain::time::now;

const FIRST_MESSAGE_ID: u64 = 1_000;

#[derive(Debug)]
pub(crate) struct World {
    pub members: HashMap<(CommunityId, UserId), Member>,
    pub channels: HashMap<ChannelId, CommunityId>,
    pub messages: HashMap<ChannelId, BTreeMap<MessageId, Message>>,
    pub direct_messages: Vec<(UserId, String)>,
    pub reactions: Vec<(MessageId, String)>,
    /// Roles placed above the bot's own; touching them is refused.
    pub protected_roles: HashSet<RoleId>,
    next_message: u64,
}

impl Default for World {
    fn default() -> Self {
        Self {
            members: HashMap::new(),
            channels: HashMap::new(),
            messages: HashMap::new(),
            direct_messages: Vec::new(),
            reactions: Vec::new(),
            protected_roles: HashSet::new(),
            next_message: FIRST_MESSAGE_ID,
        }
    }
}

impl World {
    pub fn member_mut(
        &mut self,
        community: CommunityId,
        user: UserId,
    ) -> Result<&mut Member, ExternalApiError> {
        self.members
            .get_mut(&(community, user))
            .ok_or_else(|| ExternalApiError::UnknownObject(format!("member {user}")))
    }

    pub fn check_role(&self, role: RoleId) -> Result<(), ExternalApiError> {
        if self.protected_roles.contains(&role) {
            return Err(ExternalApiError::Forbidden(format!(
                "role {role} is above the bot"
            )));
        }
        Ok(())
    }

    pub fn community_of(&self, channel: ChannelId) -> Result<CommunityId, ExternalApiError> {
        self.channels
            .get(&channel)
            .copied()
            .ok_or_else(|| ExternalApiError::UnknownObject(format!("channel {channel}")))
    }

    pub fn post(
        &mut self,
        channel: ChannelId,
        author: UserId,
        author_is_bot: bool,
        content: String,
    ) -> Result<Message, ExternalApiError> {
        let community = self.community_of(channel)?;
        let id = MessageId::new(self.next_message);
        self.next_message += 1;
        let message = Message {
            id,
            community,
            channel,
            author,
            author_is_bot,
            content,
            created_at: now(),
        };
        self.messages
            .entry(channel)
            .or_default()
            .insert(id, message.clone());
        Ok(message)
    }

    pub fn message_mut(
        &mut self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<&mut Message, ExternalApiError> {
        self.messages
            .get_mut(&channel)
            .and_then(|messages| messages.get_mut(&message))
            .ok_or_else(|| ExternalApiError::UnknownObject(format!("message {message}")))
    }

    pub fn remove_message(
        &mut self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Message, ExternalApiError> {
        self.messages
            .get_mut(&channel)
            .and_then(|messages| messages.remove(&message))
            .ok_or_else(|| ExternalApiError::UnknownObject(format!("message {message}")))
    }

    pub fn next_direct_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message);
        self.next_message += 1;
        id
    }
}
