//! Role automation rules.
//!
//! Three kinds of rule live in the rule store:
//! - [`AutomationRule`] — when a member gains `trigger_role`, add and remove
//!   fixed sets of roles.
//! - [`ConditionalRoleRule`] — gate every grant of a role on the member's
//!   other roles (blocking roles deny, deferral roles postpone).
//! - [`ChannelRestriction`] — require a gating role (and optionally some
//!   seniority) before a member may post in or join a channel.
//!
//! Role lists arrive from the command layer as comma-delimited text and are
//! parsed once, at definition time, by [`parse_role_list`].

mod conditional;
mod deferral;
mod restriction;
mod roles;

pub use conditional::{ConditionalRoleRule, GrantVerdict};
pub use deferral::DeferredGrant;
pub use restriction::{ChannelRestriction, RestrictionScope};
pub use roles::parse_role_list;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WardenError};
use crate::id::{CommunityId, RoleId, RuleId};
use crate::member::Member;

/// Trigger-based autorole rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub community: CommunityId,
    pub name: String,
    pub trigger_role: RoleId,
    pub roles_to_add: BTreeSet<RoleId>,
    pub roles_to_remove: BTreeSet<RoleId>,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - both role sets are empty ([`ValidationError::NoRoleChanges`])
    /// - a role is both added and removed ([`ValidationError::OverlappingRoles`])
    /// - the trigger role would remove itself ([`ValidationError::SelfReferencingRole`])
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.roles_to_add.is_empty() && self.roles_to_remove.is_empty() {
            return Err(ValidationError::NoRoleChanges.into());
        }
        if let Some(role) = self.roles_to_add.intersection(&self.roles_to_remove).next() {
            return Err(ValidationError::OverlappingRoles(*role).into());
        }
        if self.roles_to_remove.contains(&self.trigger_role) {
            return Err(ValidationError::SelfReferencingRole(self.trigger_role).into());
        }
        Ok(())
    }

    /// Whether gaining `role` activates this rule.
    #[must_use]
    pub fn is_triggered_by(&self, role: RoleId) -> bool {
        self.trigger_role == role
    }

    /// Roles the member still needs to receive.
    pub fn missing_grants<'a>(&'a self, member: &'a Member) -> impl Iterator<Item = RoleId> + 'a {
        self.roles_to_add
            .iter()
            .copied()
            .filter(|role| !member.has_role(*role))
    }

    /// Roles the member still needs to lose.
    pub fn pending_revokes<'a>(
        &'a self,
        member: &'a Member,
    ) -> impl Iterator<Item = RoleId> + 'a {
        self.roles_to_remove
            .iter()
            .copied()
            .filter(|role| member.has_role(*role))
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<RuleId>,
    community: Option<CommunityId>,
    name: Option<String>,
    trigger_role: Option<RoleId>,
    roles_to_add: BTreeSet<RoleId>,
    roles_to_remove: BTreeSet<RoleId>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn community(mut self, community: CommunityId) -> Self {
        self.community = Some(community);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn trigger_role(mut self, role: RoleId) -> Self {
        self.trigger_role = Some(role);
        self
    }

    #[must_use]
    pub fn add_role(mut self, role: RoleId) -> Self {
        self.roles_to_add.insert(role);
        self
    }

    #[must_use]
    pub fn remove_role(mut self, role: RoleId) -> Self {
        self.roles_to_remove.insert(role);
        self
    }

    #[must_use]
    pub fn roles_to_add(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles_to_add.extend(roles);
        self
    }

    #[must_use]
    pub fn roles_to_remove(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles_to_remove.extend(roles);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] if an invariant fails.
    pub fn build(self) -> Result<AutomationRule, WardenError> {
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            community: self.community.unwrap_or(CommunityId::new(0)),
            name: self.name.unwrap_or_default(),
            trigger_role: self.trigger_role.unwrap_or(RoleId::new(0)),
            roles_to_add: self.roles_to_add,
            roles_to_remove: self.roles_to_remove,
        };
        rule.validate()?;
        Ok(rule)
    }
}
