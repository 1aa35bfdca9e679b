//! Rule service — use-cases for managing autorole, conditional-role and
//! channel-restriction rules.

use std::time::Duration;

use guildwarden_domain::automation::{
    AutomationRule, ChannelRestriction, ConditionalRoleRule, RestrictionScope, parse_role_list,
};
use guildwarden_domain::error::{NotFoundError, ValidationError, WardenError};
use guildwarden_domain::id::{ChannelId, CommunityId, RestrictionId, RoleId, RuleId};

use crate::ports::RuleRepository;

/// Application service for rule CRUD operations.
pub struct RuleService<R> {
    repo: R,
}

impl<R: RuleRepository> RuleService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create an autorole rule from comma-separated role lists.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] when a list contains something
    /// other than role ids, when the rule breaks an invariant or when its
    /// name is taken; otherwise a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn create_autorole(
        &self,
        community: CommunityId,
        name: &str,
        trigger_role: RoleId,
        roles_to_add: &str,
        roles_to_remove: &str,
    ) -> Result<AutomationRule, WardenError> {
        let rule = AutomationRule::builder()
            .community(community)
            .name(name)
            .trigger_role(trigger_role)
            .roles_to_add(parse_role_list(roles_to_add)?)
            .roles_to_remove(parse_role_list(roles_to_remove)?)
            .build()?;
        self.create_rule(rule).await
    }

    /// Persist an already-built autorole rule after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] if invariants fail or the name is
    /// taken, or a storage error.
    #[tracing::instrument(skip(self, rule), fields(community = %rule.community, rule_name = %rule.name))]
    pub async fn create_rule(&self, rule: AutomationRule) -> Result<AutomationRule, WardenError> {
        rule.validate()?;
        self.repo.create_rule(rule).await
    }

    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] when no rule has `id`, or a storage
    /// error.
    pub async fn get_rule(&self, id: RuleId) -> Result<AutomationRule, WardenError> {
        self.repo.get_rule(id).await?.ok_or_else(|| not_found("AutomationRule", id))
    }

    /// Autorole rules of a community, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_rules(&self, community: CommunityId) -> Result<Vec<AutomationRule>, WardenError> {
        self.repo.rules_for_community(community).await
    }

    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] if invariants fail, or a storage
    /// error.
    #[tracing::instrument(skip(self, rule), fields(rule = %rule.id))]
    pub async fn update_rule(&self, rule: AutomationRule) -> Result<AutomationRule, WardenError> {
        rule.validate()?;
        self.repo.update_rule(rule).await
    }

    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] when no rule has `id`, or a storage
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), WardenError> {
        if self.repo.delete_rule(id).await? {
            Ok(())
        } else {
            Err(not_found("AutomationRule", id))
        }
    }

    /// Set the blocking and deferral roles of `role`, replacing any previous
    /// condition.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] for a malformed role list or a
    /// role conditioned on itself, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn set_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
        blocking_roles: &str,
        deferral_roles: &str,
    ) -> Result<ConditionalRoleRule, WardenError> {
        let rule = ConditionalRoleRule::new(
            community,
            role,
            parse_role_list(blocking_roles)?,
            parse_role_list(deferral_roles)?,
        )?;
        self.repo.upsert_conditional(rule).await
    }

    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_conditionals(
        &self,
        community: CommunityId,
    ) -> Result<Vec<ConditionalRoleRule>, WardenError> {
        self.repo.conditionals_for_community(community).await
    }

    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] when `role` has no condition, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        if self.repo.delete_conditional(community, role).await? {
            Ok(())
        } else {
            Err(not_found("ConditionalRoleRule", role))
        }
    }

    /// Gate `scope` in `channel` behind `gating_role`, optionally held for at
    /// least `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroDuration`] for a zero threshold, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn add_restriction(
        &self,
        community: CommunityId,
        channel: ChannelId,
        gating_role: RoleId,
        scope: RestrictionScope,
        threshold: Option<Duration>,
    ) -> Result<ChannelRestriction, WardenError> {
        let mut restriction = ChannelRestriction::new(community, channel, gating_role, scope);
        if let Some(threshold) = threshold {
            if threshold.is_zero() {
                return Err(ValidationError::ZeroDuration.into());
            }
            restriction = restriction.with_threshold(threshold);
        }
        self.repo.create_restriction(restriction).await
    }

    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_restrictions(
        &self,
        community: CommunityId,
    ) -> Result<Vec<ChannelRestriction>, WardenError> {
        self.repo.restrictions_for_community(community).await
    }

    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] for an unknown id, or a storage
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_restriction(&self, id: RestrictionId) -> Result<(), WardenError> {
        if self.repo.delete_restriction(id).await? {
            Ok(())
        } else {
            Err(not_found("ChannelRestriction", id))
        }
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> WardenError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRules;

    const GUILD: CommunityId = CommunityId::new(1);

    fn service() -> RuleService<InMemoryRules> {
        RuleService::new(InMemoryRules::default())
    }

    #[tokio::test]
    async fn should_create_autorole_when_lists_are_valid() {
        let svc = service();

        let rule = svc
            .create_autorole(GUILD, "verified", RoleId::new(1), "2, <@&3>", "4")
            .await
            .unwrap();

        assert_eq!(rule.roles_to_add.len(), 2);
        assert!(rule.roles_to_remove.contains(&RoleId::new(4)));
        assert_eq!(svc.get_rule(rule.id).await.unwrap(), rule);
    }

    #[tokio::test]
    async fn should_reject_autorole_when_list_has_role_names() {
        let svc = service();

        let result = svc
            .create_autorole(GUILD, "verified", RoleId::new(1), "2, members", "")
            .await;

        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::InvalidRoleId(_)))
        ));
        assert!(svc.list_rules(GUILD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_reject_duplicate_rule_name_in_community() {
        let svc = service();
        svc.create_autorole(GUILD, "verified", RoleId::new(1), "2", "")
            .await
            .unwrap();

        let result = svc
            .create_autorole(GUILD, "verified", RoleId::new(5), "6", "")
            .await;

        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::DuplicateName(_)))
        ));
    }

    #[tokio::test]
    async fn should_reject_overlapping_add_and_remove() {
        let svc = service();
        let result = svc
            .create_autorole(GUILD, "odd", RoleId::new(1), "2,3", "3")
            .await;
        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::OverlappingRoles(_)))
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_unknown_rule() {
        let svc = service();
        let result = svc.delete_rule(RuleId::new()).await;
        assert!(matches!(result, Err(WardenError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_replace_conditional_when_set_twice() {
        let svc = service();
        svc.set_conditional(GUILD, RoleId::new(10), "11", "")
            .await
            .unwrap();
        svc.set_conditional(GUILD, RoleId::new(10), "", "12")
            .await
            .unwrap();

        let rules = svc.list_conditionals(GUILD).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].blocking_roles.is_empty());
        assert!(rules[0].deferral_roles.contains(&RoleId::new(12)));
    }

    #[tokio::test]
    async fn should_reject_role_conditioned_on_itself() {
        let svc = service();
        let result = svc.set_conditional(GUILD, RoleId::new(10), "10", "").await;
        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::SelfReferencingRole(_)))
        ));
    }

    #[tokio::test]
    async fn should_reject_zero_restriction_threshold() {
        let svc = service();
        let result = svc
            .add_restriction(
                GUILD,
                ChannelId::new(3),
                RoleId::new(4),
                RestrictionScope::Messages,
                Some(Duration::ZERO),
            )
            .await;
        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::ZeroDuration))
        ));
    }

    #[tokio::test]
    async fn should_list_and_remove_restrictions() {
        let svc = service();
        let restriction = svc
            .add_restriction(
                GUILD,
                ChannelId::new(3),
                RoleId::new(4),
                RestrictionScope::Joins,
                Some(Duration::from_secs(600)),
            )
            .await
            .unwrap();

        assert_eq!(svc.list_restrictions(GUILD).await.unwrap().len(), 1);
        svc.remove_restriction(restriction.id).await.unwrap();
        assert!(svc.list_restrictions(GUILD).await.unwrap().is_empty());
    }
}
