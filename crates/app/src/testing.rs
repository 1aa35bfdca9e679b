//! In-memory fakes of every port, shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Mutex;

use guildwarden_domain::automation::{
    AutomationRule, ChannelRestriction, ConditionalRoleRule, DeferredGrant, RestrictionScope,
};
use guildwarden_domain::counting::CountingState;
use guildwarden_domain::error::{ExternalApiError, ValidationError, WardenError};
use guildwarden_domain::event::Message;
use guildwarden_domain::id::{
    ChannelId, CommunityId, LinkId, MessageId, RestrictionId, RoleId, RuleId, TaskId, UserId,
};
use guildwarden_domain::member::Member;
use guildwarden_domain::mirror::MirrorLink;
use guildwarden_domain::task::ScheduledTask;
use guildwarden_domain::task_log::TaskLogEntry;
use guildwarden_domain::time::Timestamp;

use crate::ports::{
    CountingRepository, DeferralRepository, MembershipApi, MessagingApi, MirrorRepository,
    RuleRepository, TaskLogStore, TaskRepository,
};

// ── Platform ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePlatform {
    pub state: Mutex<PlatformState>,
}

#[derive(Default)]
pub struct PlatformState {
    pub members: HashMap<(CommunityId, UserId), Member>,
    pub messages: BTreeMap<MessageId, Message>,
    pub direct_messages: Vec<(UserId, String)>,
    pub reactions: Vec<(MessageId, String)>,
    pub calls: Vec<&'static str>,
    pub failures: VecDeque<(&'static str, ExternalApiError)>,
    pub forbidden_roles: HashSet<RoleId>,
    pub forbidden_channels: HashSet<ChannelId>,
    next_id: u64,
}

impl PlatformState {
    fn record(&mut self, op: &'static str) -> Result<(), WardenError> {
        self.calls.push(op);
        if let Some(pos) = self.failures.iter().position(|(name, _)| *name == op) {
            if let Some((_, err)) = self.failures.remove(pos) {
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn next_message_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId::new(1_000_000 + self.next_id)
    }
}

impl FakePlatform {
    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        let platform = Self::default();
        for member in members {
            platform.add_member(member);
        }
        platform
    }

    pub fn add_member(&self, member: Member) {
        let mut state = self.state.lock().unwrap();
        state.members.insert((member.community, member.id), member);
    }

    pub fn member(&self, community: CommunityId, user: UserId) -> Member {
        self.state.lock().unwrap().members[&(community, user)].clone()
    }

    /// Make the next call to `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: ExternalApiError) {
        self.state.lock().unwrap().failures.push_back((op, err));
    }

    pub fn forbid_role(&self, role: RoleId) {
        self.state.lock().unwrap().forbidden_roles.insert(role);
    }

    pub fn forbid_channel(&self, channel: ChannelId) {
        self.state.lock().unwrap().forbidden_channels.insert(channel);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Calls that change platform state.
    pub fn mutating_calls(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| !matches!(**c, "get_member" | "list_members" | "fetch_history"))
            .count()
    }

    pub fn messages_in(&self, channel: ChannelId) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .messages
            .values()
            .filter(|m| m.channel == channel)
            .cloned()
            .collect()
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.state.lock().unwrap().messages.get(&id).cloned()
    }

    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.state.lock().unwrap().direct_messages.clone()
    }

    pub fn reactions(&self) -> Vec<(MessageId, String)> {
        self.state.lock().unwrap().reactions.clone()
    }

    /// Insert a message as if a user had posted it.
    pub fn seed_message(&self, message: Message) {
        self.state.lock().unwrap().messages.insert(message.id, message);
    }
}

impl MembershipApi for FakePlatform {
    fn grant_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("grant_role").and_then(|()| {
            if state.forbidden_roles.contains(&role) {
                return Err(ExternalApiError::Forbidden(format!("role {role}")).into());
            }
            let entry = state
                .members
                .get_mut(&(community, member))
                .ok_or_else(|| ExternalApiError::UnknownObject(format!("member {member}")))?;
            entry.roles.insert(role);
            Ok(())
        });
        async { result }
    }

    fn revoke_role(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("revoke_role").and_then(|()| {
            if state.forbidden_roles.contains(&role) {
                return Err(ExternalApiError::Forbidden(format!("role {role}")).into());
            }
            let entry = state
                .members
                .get_mut(&(community, member))
                .ok_or_else(|| ExternalApiError::UnknownObject(format!("member {member}")))?;
            entry.roles.remove(&role);
            Ok(())
        });
        async { result }
    }

    fn get_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> impl Future<Output = Result<Option<Member>, WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state
            .record("get_member")
            .map(|()| state.members.get(&(community, member)).cloned());
        async { result }
    }

    fn list_members(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<Member>, WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("list_members").map(|()| {
            let mut members: Vec<Member> = state
                .members
                .values()
                .filter(|m| m.community == community)
                .cloned()
                .collect();
            members.sort_by_key(|m| m.id);
            members
        });
        async { result }
    }
}

impl MessagingApi for FakePlatform {
    fn send_message(
        &self,
        channel: ChannelId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("send_message").and_then(|()| {
            if state.forbidden_channels.contains(&channel) {
                return Err(ExternalApiError::Forbidden(format!("channel {channel}")).into());
            }
            let id = state.next_message_id();
            state.messages.insert(
                id,
                Message {
                    id,
                    community: CommunityId::new(0),
                    channel,
                    author: UserId::new(0),
                    author_is_bot: true,
                    content,
                    created_at: guildwarden_domain::time::now(),
                },
            );
            Ok(id)
        });
        async { result }
    }

    fn edit_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("edit_message").and_then(|()| {
            let entry = state
                .messages
                .get_mut(&message)
                .ok_or_else(|| ExternalApiError::UnknownObject(format!("message {message}")))?;
            entry.content = content;
            Ok(())
        });
        async { result }
    }

    fn delete_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("delete_message").and_then(|()| {
            state
                .messages
                .remove(&message)
                .map(|_| ())
                .ok_or_else(|| ExternalApiError::UnknownObject(format!("message {message}")).into())
        });
        async { result }
    }

    fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: String,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("add_reaction").map(|()| {
            state.reactions.push((message, emoji));
        });
        async { result }
    }

    fn send_direct_message(
        &self,
        user: UserId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("send_direct_message").map(|()| {
            state.direct_messages.push((user, content));
            state.next_message_id()
        });
        async { result }
    }

    fn fetch_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>, WardenError>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = state.record("fetch_history").map(|()| {
            let mut history: Vec<Message> = state
                .messages
                .values()
                .filter(|m| m.channel == channel)
                .cloned()
                .collect();
            history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            history.truncate(limit);
            history
        });
        async { result }
    }
}

// ── Rules ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRules {
    pub rules: Mutex<HashMap<RuleId, AutomationRule>>,
    pub conditionals: Mutex<HashMap<(CommunityId, RoleId), ConditionalRoleRule>>,
    pub restrictions: Mutex<HashMap<RestrictionId, ChannelRestriction>>,
}

impl RuleRepository for InMemoryRules {
    fn create_rule(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, WardenError>> + Send {
        let mut rules = self.rules.lock().unwrap();
        let duplicate = rules
            .values()
            .any(|r| r.community == rule.community && r.name == rule.name);
        let result = if duplicate {
            Err(ValidationError::DuplicateName(rule.name.clone()).into())
        } else {
            rules.insert(rule.id, rule.clone());
            Ok(rule)
        };
        async { result }
    }

    fn get_rule(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, WardenError>> + Send {
        let result = self.rules.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn rules_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, WardenError>> + Send {
        let mut result: Vec<AutomationRule> = self
            .rules
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.community == community)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async { Ok(result) }
    }

    fn update_rule(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, WardenError>> + Send {
        self.rules.lock().unwrap().insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn delete_rule(&self, id: RuleId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let removed = self.rules.lock().unwrap().remove(&id).is_some();
        async move { Ok(removed) }
    }

    fn upsert_conditional(
        &self,
        rule: ConditionalRoleRule,
    ) -> impl Future<Output = Result<ConditionalRoleRule, WardenError>> + Send {
        self.conditionals
            .lock()
            .unwrap()
            .insert((rule.community, rule.role), rule.clone());
        async { Ok(rule) }
    }

    fn get_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> impl Future<Output = Result<Option<ConditionalRoleRule>, WardenError>> + Send {
        let result = self.conditionals.lock().unwrap().get(&(community, role)).cloned();
        async { Ok(result) }
    }

    fn conditionals_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<ConditionalRoleRule>, WardenError>> + Send {
        let mut result: Vec<ConditionalRoleRule> = self
            .conditionals
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.community == community)
            .cloned()
            .collect();
        result.sort_by_key(|r| r.role);
        async { Ok(result) }
    }

    fn delete_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let removed = self
            .conditionals
            .lock()
            .unwrap()
            .remove(&(community, role))
            .is_some();
        async move { Ok(removed) }
    }

    fn create_restriction(
        &self,
        restriction: ChannelRestriction,
    ) -> impl Future<Output = Result<ChannelRestriction, WardenError>> + Send {
        self.restrictions
            .lock()
            .unwrap()
            .insert(restriction.id, restriction.clone());
        async { Ok(restriction) }
    }

    fn restrictions_for_channel(
        &self,
        channel: ChannelId,
        scope: RestrictionScope,
    ) -> impl Future<Output = Result<Vec<ChannelRestriction>, WardenError>> + Send {
        let result: Vec<ChannelRestriction> = self
            .restrictions
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.channel == channel && r.scope == scope)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn restrictions_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<ChannelRestriction>, WardenError>> + Send {
        let result: Vec<ChannelRestriction> = self
            .restrictions
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.community == community)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn delete_restriction(
        &self,
        id: RestrictionId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let removed = self.restrictions.lock().unwrap().remove(&id).is_some();
        async move { Ok(removed) }
    }
}

// ── Deferrals ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryDeferrals {
    pub grants: Mutex<HashMap<(CommunityId, UserId, RoleId), DeferredGrant>>,
}

impl InMemoryDeferrals {
    pub fn len(&self) -> usize {
        self.grants.lock().unwrap().len()
    }
}

impl DeferralRepository for InMemoryDeferrals {
    fn insert_if_absent(
        &self,
        grant: DeferredGrant,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let mut grants = self.grants.lock().unwrap();
        let key = (grant.community, grant.member, grant.role);
        let inserted = if grants.contains_key(&key) {
            false
        } else {
            grants.insert(key, grant);
            true
        };
        async move { Ok(inserted) }
    }

    fn get(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<Option<DeferredGrant>, WardenError>> + Send {
        let result = self
            .grants
            .lock()
            .unwrap()
            .get(&(community, member, role))
            .cloned();
        async { Ok(result) }
    }

    fn list_for_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> impl Future<Output = Result<Vec<DeferredGrant>, WardenError>> + Send {
        let result: Vec<DeferredGrant> = self
            .grants
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.community == community && g.member == member)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn list_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<DeferredGrant>, WardenError>> + Send {
        let mut result: Vec<DeferredGrant> = self
            .grants
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.community == community)
            .cloned()
            .collect();
        result.sort_by_key(|g| g.queued_at);
        async { Ok(result) }
    }

    fn remove(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let removed = self
            .grants
            .lock()
            .unwrap()
            .remove(&(community, member, role))
            .is_some();
        async move { Ok(removed) }
    }
}

// ── Mirror ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryMirror {
    pub links: Mutex<HashMap<LinkId, MirrorLink>>,
    pub map: Mutex<HashMap<LinkId, BTreeMap<MessageId, MessageId>>>,
}

impl InMemoryMirror {
    pub fn mapping_count(&self, link: LinkId) -> usize {
        self.map.lock().unwrap().get(&link).map_or(0, BTreeMap::len)
    }
}

impl MirrorRepository for InMemoryMirror {
    fn create_link(
        &self,
        link: MirrorLink,
    ) -> impl Future<Output = Result<MirrorLink, WardenError>> + Send {
        self.links.lock().unwrap().insert(link.id, link.clone());
        async { Ok(link) }
    }

    fn get_link(
        &self,
        id: LinkId,
    ) -> impl Future<Output = Result<Option<MirrorLink>, WardenError>> + Send {
        let result = self.links.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn update_link(
        &self,
        link: MirrorLink,
    ) -> impl Future<Output = Result<MirrorLink, WardenError>> + Send {
        self.links.lock().unwrap().insert(link.id, link.clone());
        async { Ok(link) }
    }

    fn delete_link(&self, id: LinkId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let removed = self.links.lock().unwrap().remove(&id).is_some();
        self.map.lock().unwrap().remove(&id);
        async move { Ok(removed) }
    }

    fn links_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<MirrorLink>, WardenError>> + Send {
        let result: Vec<MirrorLink> = self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.community == community)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn links_for_source(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Vec<MirrorLink>, WardenError>> + Send {
        let result: Vec<MirrorLink> = self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.source_channel == channel)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn insert_mapping(
        &self,
        link: LinkId,
        source: MessageId,
        target: MessageId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let mut map = self.map.lock().unwrap();
        let entries = map.entry(link).or_default();
        let clash = entries.contains_key(&source) || entries.values().any(|t| *t == target);
        if !clash {
            entries.insert(source, target);
        }
        async move { Ok(!clash) }
    }

    fn target_for(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> impl Future<Output = Result<Option<MessageId>, WardenError>> + Send {
        let result = self
            .map
            .lock()
            .unwrap()
            .get(&link)
            .and_then(|m| m.get(&source).copied());
        async move { Ok(result) }
    }

    fn remove_mapping(
        &self,
        link: LinkId,
        source: MessageId,
    ) -> impl Future<Output = Result<Option<MessageId>, WardenError>> + Send {
        let result = self
            .map
            .lock()
            .unwrap()
            .get_mut(&link)
            .and_then(|m| m.remove(&source));
        async move { Ok(result) }
    }
}

// ── Counting ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCounting {
    pub states: Mutex<HashMap<ChannelId, CountingState>>,
    /// Number of upcoming saves that report a lost race.
    pub conflicts: Mutex<u32>,
}

impl CountingRepository for InMemoryCounting {
    fn get(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Option<CountingState>, WardenError>> + Send {
        let result = self.states.lock().unwrap().get(&channel).cloned();
        async { Ok(result) }
    }

    fn save_if_version(
        &self,
        state: CountingState,
        expected_version: u64,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let mut conflicts = self.conflicts.lock().unwrap();
        let saved = if *conflicts > 0 {
            *conflicts -= 1;
            false
        } else {
            let mut states = self.states.lock().unwrap();
            let current = states.get(&state.channel).map_or(0, |s| s.version);
            if current == expected_version {
                states.insert(state.channel, state);
                true
            } else {
                false
            }
        };
        async move { Ok(saved) }
    }

    fn list_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<CountingState>, WardenError>> + Send {
        let result: Vec<CountingState> = self
            .states
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.community == community)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn delete(&self, channel: ChannelId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let removed = self.states.lock().unwrap().remove(&channel).is_some();
        async move { Ok(removed) }
    }
}

// ── Tasks ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryTasks {
    pub tasks: Mutex<HashMap<TaskId, ScheduledTask>>,
    /// Tasks whose `update` and `delete` fail with a storage error.
    pub broken: Mutex<HashSet<TaskId>>,
}

impl InMemoryTasks {
    pub fn break_task(&self, id: TaskId) {
        self.broken.lock().unwrap().insert(id);
    }

    fn check(&self, id: TaskId) -> Result<(), WardenError> {
        if self.broken.lock().unwrap().contains(&id) {
            return Err(WardenError::storage(std::io::Error::other("database is locked")));
        }
        Ok(())
    }

    pub fn all(&self) -> Vec<ScheduledTask> {
        let mut tasks: Vec<ScheduledTask> = self.tasks.lock().unwrap().values().cloned().collect();
        tasks.sort_by_key(|t| t.due_time);
        tasks
    }
}

impl TaskRepository for InMemoryTasks {
    fn create(
        &self,
        task: ScheduledTask,
    ) -> impl Future<Output = Result<ScheduledTask, WardenError>> + Send {
        self.tasks.lock().unwrap().insert(task.id, task.clone());
        async { Ok(task) }
    }

    fn get(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<ScheduledTask>, WardenError>> + Send {
        let result = self.tasks.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn due(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<ScheduledTask>, WardenError>> + Send {
        let result: Vec<ScheduledTask> = self
            .all()
            .into_iter()
            .filter(|t| t.due_time <= now)
            .collect();
        async { Ok(result) }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<ScheduledTask>, WardenError>> + Send {
        let result = self.all();
        async { Ok(result) }
    }

    fn update(
        &self,
        task: ScheduledTask,
    ) -> impl Future<Output = Result<ScheduledTask, WardenError>> + Send {
        let result = self.check(task.id).map(|()| {
            let mut tasks = self.tasks.lock().unwrap();
            // A cancel that raced the update wins.
            let mut task = task;
            if tasks.get(&task.id).is_some_and(|t| t.cancelled) {
                task.cancelled = true;
            }
            tasks.insert(task.id, task.clone());
            task
        });
        async { result }
    }

    fn cancel(&self, id: TaskId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let found = match self.tasks.lock().unwrap().get_mut(&id) {
            Some(task) => {
                task.cancelled = true;
                true
            }
            None => false,
        };
        async move { Ok(found) }
    }

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        let result = self
            .check(id)
            .map(|()| self.tasks.lock().unwrap().remove(&id).is_some());
        async move { result }
    }
}

#[derive(Default)]
pub struct InMemoryTaskLog {
    pub entries: Mutex<Vec<TaskLogEntry>>,
}

impl InMemoryTaskLog {
    pub fn all(&self) -> Vec<TaskLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl TaskLogStore for InMemoryTaskLog {
    fn append(
        &self,
        entry: TaskLogEntry,
    ) -> impl Future<Output = Result<TaskLogEntry, WardenError>> + Send {
        self.entries.lock().unwrap().push(entry.clone());
        async { Ok(entry) }
    }

    fn recent(
        &self,
        task_ref: Option<String>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLogEntry>, WardenError>> + Send {
        let result: Vec<TaskLogEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| task_ref.as_deref().is_none_or(|r| e.task_ref == r))
            .take(limit)
            .cloned()
            .collect();
        async { Ok(result) }
    }
}
