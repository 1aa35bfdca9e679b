use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WardenError};
use crate::id::{CommunityId, RoleId};
use crate::member::Member;

/// Conditions attached to every grant of `role` within a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRoleRule {
    pub community: CommunityId,
    pub role: RoleId,
    /// Holding any of these denies the grant outright.
    pub blocking_roles: BTreeSet<RoleId>,
    /// Holding any of these postpones the grant until they are gone.
    pub deferral_roles: BTreeSet<RoleId>,
}

/// Outcome of checking a prospective grant against a [`ConditionalRoleRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantVerdict {
    Allowed,
    Blocked { by: Vec<RoleId> },
    Deferred { by: Vec<RoleId> },
}

impl ConditionalRoleRule {
    /// Create and validate a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SelfReferencingRole`] when `role` appears in
    /// its own blocking or deferral set.
    pub fn new(
        community: CommunityId,
        role: RoleId,
        blocking_roles: BTreeSet<RoleId>,
        deferral_roles: BTreeSet<RoleId>,
    ) -> Result<Self, WardenError> {
        let rule = Self {
            community,
            role,
            blocking_roles,
            deferral_roles,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SelfReferencingRole`] when the conditioned
    /// role is listed as one of its own blockers or deferrers.
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.blocking_roles.contains(&self.role) || self.deferral_roles.contains(&self.role) {
            return Err(ValidationError::SelfReferencingRole(self.role).into());
        }
        Ok(())
    }

    /// Decide whether `member` may receive the role right now.
    ///
    /// Blocking roles take precedence over deferral roles.
    #[must_use]
    pub fn verdict_for(&self, member: &Member) -> GrantVerdict {
        let blockers = member.held_among(&self.blocking_roles);
        if !blockers.is_empty() {
            return GrantVerdict::Blocked { by: blockers };
        }
        let deferrers = member.held_among(&self.deferral_roles);
        if !deferrers.is_empty() {
            return GrantVerdict::Deferred { by: deferrers };
        }
        GrantVerdict::Allowed
    }

    #[must_use]
    pub fn is_deferred_by(&self, role: RoleId) -> bool {
        self.deferral_roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::UserId;

    const TRUSTED: RoleId = RoleId::new(1);
    const MUTED: RoleId = RoleId::new(2);
    const PROBATION: RoleId = RoleId::new(3);

    fn rule() -> ConditionalRoleRule {
        ConditionalRoleRule::new(
            CommunityId::new(7),
            TRUSTED,
            [MUTED].into(),
            [PROBATION].into(),
        )
        .unwrap()
    }

    fn member(roles: &[RoleId]) -> Member {
        Member::new(UserId::new(10), CommunityId::new(7), crate::time::now())
            .with_roles(roles.iter().copied())
    }

    #[test]
    fn should_allow_when_member_holds_no_conditioned_roles() {
        assert_eq!(rule().verdict_for(&member(&[])), GrantVerdict::Allowed);
    }

    #[test]
    fn should_block_when_member_holds_blocking_role() {
        assert_eq!(
            rule().verdict_for(&member(&[MUTED])),
            GrantVerdict::Blocked { by: vec![MUTED] }
        );
    }

    #[test]
    fn should_defer_when_member_holds_deferral_role() {
        assert_eq!(
            rule().verdict_for(&member(&[PROBATION])),
            GrantVerdict::Deferred {
                by: vec![PROBATION]
            }
        );
    }

    #[test]
    fn should_prefer_blocking_over_deferral() {
        assert!(matches!(
            rule().verdict_for(&member(&[MUTED, PROBATION])),
            GrantVerdict::Blocked { .. }
        ));
    }

    #[test]
    fn should_reject_role_blocking_itself() {
        let result =
            ConditionalRoleRule::new(CommunityId::new(7), TRUSTED, [TRUSTED].into(), BTreeSet::new());
        assert!(matches!(
            result,
            Err(WardenError::Validation(ValidationError::SelfReferencingRole(_)))
        ));
    }
}
