//! Rule store ports — autorole rules, conditional roles, channel restrictions
//! and pending deferred grants.

use std::future::Future;
use std::sync::Arc;

use guildwarden_domain::automation::{
    AutomationRule, ChannelRestriction, ConditionalRoleRule, DeferredGrant, RestrictionScope,
};
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{ChannelId, CommunityId, RestrictionId, RoleId, RuleId, UserId};

/// Repository for the three kinds of role automation rule.
pub trait RuleRepository {
    /// Persist a new autorole rule.
    ///
    /// Fails with [`ValidationError::DuplicateName`] when the community
    /// already has a rule with the same name.
    ///
    /// [`ValidationError::DuplicateName`]: guildwarden_domain::error::ValidationError::DuplicateName
    fn create_rule(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, WardenError>> + Send;

    fn get_rule(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, WardenError>> + Send;

    /// All autorole rules of a community, ordered by name.
    fn rules_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, WardenError>> + Send;

    fn update_rule(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, WardenError>> + Send;

    /// Returns `false` when no rule had that id.
    fn delete_rule(&self, id: RuleId) -> impl Future<Output = Result<bool, WardenError>> + Send;

    /// Insert or replace the conditional rule for `(community, role)`.
    fn upsert_conditional(
        &self,
        rule: ConditionalRoleRule,
    ) -> impl Future<Output = Result<ConditionalRoleRule, WardenError>> + Send;

    fn get_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> impl Future<Output = Result<Option<ConditionalRoleRule>, WardenError>> + Send;

    fn conditionals_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<ConditionalRoleRule>, WardenError>> + Send;

    fn delete_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send;

    fn create_restriction(
        &self,
        restriction: ChannelRestriction,
    ) -> impl Future<Output = Result<ChannelRestriction, WardenError>> + Send;

    /// Restrictions governing `scope` in `channel`.
    fn restrictions_for_channel(
        &self,
        channel: ChannelId,
        scope: RestrictionScope,
    ) -> impl Future<Output = Result<Vec<ChannelRestriction>, WardenError>> + Send;

    fn restrictions_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<ChannelRestriction>, WardenError>> + Send;

    fn delete_restriction(
        &self,
        id: RestrictionId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send;
}

/// Pending conditional-role grants, at most one per `(community, member, role)`.
pub trait DeferralRepository {
    /// Store `grant` unless one already exists for the same key.
    ///
    /// Returns `true` when inserted. An existing grant keeps its original
    /// `queued_at`, so re-deferring never extends the horizon.
    fn insert_if_absent(
        &self,
        grant: DeferredGrant,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send;

    fn get(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<Option<DeferredGrant>, WardenError>> + Send;

    fn list_for_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> impl Future<Output = Result<Vec<DeferredGrant>, WardenError>> + Send;

    /// Oldest first.
    fn list_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<DeferredGrant>, WardenError>> + Send;

    /// Returns `false` when nothing was queued for the key.
    fn remove(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send;
}

impl<T: RuleRepository + Send + Sync> RuleRepository for Arc<T> {
    fn create_rule(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, WardenError>> + Send {
        (**self).create_rule(rule)
    }

    fn get_rule(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, WardenError>> + Send {
        (**self).get_rule(id)
    }

    fn rules_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, WardenError>> + Send {
        (**self).rules_for_community(community)
    }

    fn update_rule(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, WardenError>> + Send {
        (**self).update_rule(rule)
    }

    fn delete_rule(&self, id: RuleId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).delete_rule(id)
    }

    fn upsert_conditional(
        &self,
        rule: ConditionalRoleRule,
    ) -> impl Future<Output = Result<ConditionalRoleRule, WardenError>> + Send {
        (**self).upsert_conditional(rule)
    }

    fn get_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> impl Future<Output = Result<Option<ConditionalRoleRule>, WardenError>> + Send {
        (**self).get_conditional(community, role)
    }

    fn conditionals_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<ConditionalRoleRule>, WardenError>> + Send {
        (**self).conditionals_for_community(community)
    }

    fn delete_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).delete_conditional(community, role)
    }

    fn create_restriction(
        &self,
        restriction: ChannelRestriction,
    ) -> impl Future<Output = Result<ChannelRestriction, WardenError>> + Send {
        (**self).create_restriction(restriction)
    }

    fn restrictions_for_channel(
        &self,
        channel: ChannelId,
        scope: RestrictionScope,
    ) -> impl Future<Output = Result<Vec<ChannelRestriction>, WardenError>> + Send {
        (**self).restrictions_for_channel(channel, scope)
    }

    fn restrictions_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<ChannelRestriction>, WardenError>> + Send {
        (**self).restrictions_for_community(community)
    }

    fn delete_restriction(
        &self,
        id: RestrictionId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).delete_restriction(id)
    }
}

impl<T: DeferralRepository + Send + Sync> DeferralRepository for Arc<T> {
    fn insert_if_absent(
        &self,
        grant: DeferredGrant,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).insert_if_absent(grant)
    }

    fn get(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<Option<DeferredGrant>, WardenError>> + Send {
        (**self).get(community, member, role)
    }

    fn list_for_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> impl Future<Output = Result<Vec<DeferredGrant>, WardenError>> + Send {
        (**self).list_for_member(community, member)
    }

    fn list_for_community(
        &self,
        community: CommunityId,
    ) -> impl Future<Output = Result<Vec<DeferredGrant>, WardenError>> + Send {
        (**self).list_for_community(community)
    }

    fn remove(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).remove(community, member, role)
    }
}
