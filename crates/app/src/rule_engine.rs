//! Rule engine — autorole, conditional role gating and channel restrictions.
//!
//! Role change events are evaluated breadth-first: every grant or revoke the
//! engine performs is queued as a follow-up step so chained rules apply in the
//! same pass, up to a fixed chain depth. Periodic sweeps re-apply every
//! autorole rule to every member and retry queued deferred grants.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use guildwarden_domain::automation::{DeferredGrant, GrantVerdict, RestrictionScope};
use guildwarden_domain::error::{ExpiredDeferral, WardenError};
use guildwarden_domain::event::{MemberEvent, RoleChange};
use guildwarden_domain::id::{ChannelId, CommunityId, RoleId, UserId};
use guildwarden_domain::member::Member;
use guildwarden_domain::task::{ScheduledTask, TaskPayload};
use guildwarden_domain::task_log::{TaskLogEntry, TaskStatus};
use guildwarden_domain::time::{Timestamp, delta, now};

use crate::executor::{Executor, describe, is_side_effect_failure};
use crate::keyed::KeyedLocks;
use crate::ports::{DeferralRepository, MembershipApi, RuleRepository, TaskLogStore, TaskRepository};

/// Task log label of community sweeps.
pub const SWEEP_TASK_REF: &str = "sweep";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleEngineConfig {
    /// Deferred grants older than this are dropped.
    pub deferral_horizon: Duration,
    /// Longest chain of engine-triggered follow-ups per event.
    pub max_chain_depth: usize,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            deferral_horizon: Duration::from_secs(30 * 24 * 60 * 60),
            max_chain_depth: 5,
        }
    }
}

/// Answer to [`RuleEngine::request_grant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantDecision {
    Granted,
    AlreadyHeld,
    Blocked { by: Vec<RoleId> },
    Deferred { by: Vec<RoleId> },
}

/// Counters describing what an evaluation or sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    pub members: usize,
    pub granted: usize,
    pub revoked: usize,
    pub blocked: usize,
    pub deferred: usize,
    pub expired: usize,
    /// Side effects the platform rejected.
    pub failed: usize,
    /// Follow-up steps dropped by the chain depth limit.
    pub truncated: usize,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    /// `role` was gained. `external` is false for sweep seeds, which only
    /// apply autorole rules.
    Gained { role: RoleId, external: bool },
    Lost { role: RoleId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferralOutcome {
    Granted,
    Pending,
    Expired,
    Dropped,
}

/// Evaluates role changes and sweeps against the rule store.
pub struct RuleEngine<R, D, T, L, P> {
    rules: R,
    deferrals: D,
    tasks: T,
    logs: L,
    executor: Arc<Executor<P>>,
    config: RuleEngineConfig,
    member_locks: KeyedLocks<(CommunityId, UserId)>,
    sweep_locks: KeyedLocks<CommunityId>,
}

impl<R, D, T, L, P> RuleEngine<R, D, T, L, P>
where
    R: RuleRepository + Sync,
    D: DeferralRepository + Sync,
    T: TaskRepository + Sync,
    L: TaskLogStore + Sync,
    P: MembershipApi + Sync,
{
    pub fn new(
        rules: R,
        deferrals: D,
        tasks: T,
        logs: L,
        executor: Arc<Executor<P>>,
        config: RuleEngineConfig,
    ) -> Self {
        Self {
            rules,
            deferrals,
            tasks,
            logs,
            executor,
            config,
            member_locks: KeyedLocks::new(),
            sweep_locks: KeyedLocks::new(),
        }
    }

    /// Apply every rule affected by a role change.
    ///
    /// # Errors
    ///
    /// Returns a storage error; platform failures are counted in the report.
    #[tracing::instrument(skip(self, event), fields(community = %event.community(), member = %event.member.id, role = %event.role, change = ?event.change))]
    pub async fn evaluate(&self, event: &MemberEvent) -> Result<RuleReport, WardenError> {
        let mut report = RuleReport::default();
        if event.member.is_bot {
            return Ok(report);
        }
        let _guard = self
            .member_locks
            .lock((event.community(), event.member.id))
            .await;
        let mut member = event.member.clone();
        let first = match event.change {
            RoleChange::Added => Step::Gained {
                role: event.role,
                external: true,
            },
            RoleChange::Removed => Step::Lost { role: event.role },
        };
        report.members = 1;
        self.run_chain(&mut member, vec![first], now(), &mut report)
            .await?;
        Ok(report)
    }

    /// Grant `role` to `member` unless a conditional rule blocks or defers it.
    ///
    /// This is the gate every component uses before granting a role.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] for an unknown member, the platform
    /// error when the grant itself fails, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn request_grant(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<GrantDecision, WardenError> {
        let _guard = self.member_locks.lock((community, member)).await;
        let mut snapshot = self.fetch_member(community, member).await?;
        let mut report = RuleReport::default();
        let decision = self
            .grant_checked(&mut snapshot, role, now(), &mut report)
            .await?;
        if decision == GrantDecision::Granted {
            let follow_up = Step::Gained {
                role,
                external: false,
            };
            self.run_chain(&mut snapshot, vec![follow_up], now(), &mut report)
                .await?;
        }
        Ok(decision)
    }

    /// Whether `member` may use `scope` in `channel`. Every restriction on the
    /// channel must be satisfied; no restriction means allowed.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn is_allowed(
        &self,
        member: &Member,
        channel: ChannelId,
        scope: RestrictionScope,
        at: Timestamp,
    ) -> Result<bool, WardenError> {
        let restrictions = self.rules.restrictions_for_channel(channel, scope).await?;
        Ok(restrictions.iter().all(|r| r.permits(member, at)))
    }

    /// Re-apply every autorole rule to every member and retry deferred grants.
    ///
    /// # Errors
    ///
    /// Returns a storage error or the failure to list members.
    pub async fn sweep_all(&self, community: CommunityId) -> Result<RuleReport, WardenError> {
        self.sweep_all_at(community, now()).await
    }

    /// [`RuleEngine::sweep_all`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`RuleEngine::sweep_all`].
    #[tracing::instrument(skip(self))]
    pub async fn sweep_all_at(
        &self,
        community: CommunityId,
        at: Timestamp,
    ) -> Result<RuleReport, WardenError> {
        let _guard = self.sweep_locks.lock(community).await;
        let started = now();
        let result = self.sweep_inner(community, at).await;
        let (status, detail) = match &result {
            Ok(report) if report.failed > 0 => (
                TaskStatus::Ok,
                Some(format!("{} side effects failed", report.failed)),
            ),
            Ok(_) => (TaskStatus::Ok, None),
            Err(err) => (TaskStatus::Error, Some(describe(err))),
        };
        let entry = TaskLogEntry::started(SWEEP_TASK_REF, started)
            .with_community(Some(community))
            .finish(now(), status, detail);
        if let Err(err) = self.logs.append(entry).await {
            tracing::warn!(error = ?err, "failed to record sweep");
        }
        if let Ok(report) = &result {
            tracing::info!(
                members = report.members,
                granted = report.granted,
                revoked = report.revoked,
                expired = report.expired,
                failed = report.failed,
                "sweep finished"
            );
        }
        result
    }

    /// Retry one deferred grant; used by the horizon re-check task.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::ExpiredDeferral`] when the grant aged out, or a
    /// storage/platform error.
    pub async fn recheck_deferral(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<(), WardenError> {
        self.recheck_deferral_at(community, member, role, now()).await
    }

    /// [`RuleEngine::recheck_deferral`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`RuleEngine::recheck_deferral`].
    #[tracing::instrument(skip(self))]
    pub async fn recheck_deferral_at(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
        at: Timestamp,
    ) -> Result<(), WardenError> {
        let _guard = self.member_locks.lock((community, member)).await;
        let Some(grant) = self.deferrals.get(community, member, role).await? else {
            return Ok(());
        };
        let Some(mut snapshot) = self.executor.get_member(community, member).await? else {
            self.deferrals.remove(community, member, role).await?;
            return Ok(());
        };
        let mut report = RuleReport::default();
        match self
            .attempt_deferred(&mut snapshot, &grant, at, &mut report)
            .await?
        {
            DeferralOutcome::Expired => Err(ExpiredDeferral {
                community,
                member,
                role,
            }
            .into()),
            DeferralOutcome::Granted => {
                let follow_up = Step::Gained {
                    role,
                    external: false,
                };
                self.run_chain(&mut snapshot, vec![follow_up], at, &mut report)
                    .await
            }
            DeferralOutcome::Pending | DeferralOutcome::Dropped => Ok(()),
        }
    }

    async fn sweep_inner(
        &self,
        community: CommunityId,
        at: Timestamp,
    ) -> Result<RuleReport, WardenError> {
        let rules = self.rules.rules_for_community(community).await?;
        let members = self.executor.list_members(community).await?;
        let mut report = RuleReport::default();
        let mut by_id: HashMap<UserId, Member> = HashMap::new();

        for mut member in members {
            if member.is_bot {
                continue;
            }
            let _guard = self.member_locks.lock((community, member.id)).await;
            report.members += 1;
            let seeds: Vec<Step> = rules
                .iter()
                .filter(|rule| member.has_role(rule.trigger_role))
                .map(|rule| Step::Gained {
                    role: rule.trigger_role,
                    external: false,
                })
                .collect();
            self.run_chain(&mut member, seeds, at, &mut report).await?;
            by_id.insert(member.id, member);
        }

        for grant in self.deferrals.list_for_community(community).await? {
            let Some(member) = by_id.get_mut(&grant.member) else {
                // Left the community.
                self.deferrals
                    .remove(community, grant.member, grant.role)
                    .await?;
                continue;
            };
            let _guard = self.member_locks.lock((community, member.id)).await;
            if self.attempt_deferred(member, &grant, at, &mut report).await? == DeferralOutcome::Granted {
                let follow_up = Step::Gained {
                    role: grant.role,
                    external: false,
                };
                self.run_chain(member, vec![follow_up], at, &mut report).await?;
            }
        }
        Ok(report)
    }

    async fn run_chain(
        &self,
        member: &mut Member,
        seeds: Vec<Step>,
        at: Timestamp,
        report: &mut RuleReport,
    ) -> Result<(), WardenError> {
        let mut queue: VecDeque<(Step, usize)> = seeds.into_iter().map(|s| (s, 0)).collect();
        while let Some((step, depth)) = queue.pop_front() {
            if depth >= self.config.max_chain_depth {
                report.truncated += 1;
                tracing::warn!(member = %member.id, ?step, depth, "rule chain depth limit reached");
                continue;
            }
            let follow_ups = match step {
                Step::Gained { role, external } => {
                    self.on_gained(member, role, external, at, report).await?
                }
                Step::Lost { role } => self.on_lost(member, role, at, report).await?,
            };
            queue.extend(follow_ups.into_iter().map(|s| (s, depth + 1)));
        }
        Ok(())
    }

    async fn on_gained(
        &self,
        member: &mut Member,
        role: RoleId,
        external: bool,
        at: Timestamp,
        report: &mut RuleReport,
    ) -> Result<Vec<Step>, WardenError> {
        let community = member.community;
        let mut follow_ups = Vec::new();

        if external {
            if let Some(rule) = self.rules.get_conditional(community, role).await? {
                match rule.verdict_for(member) {
                    GrantVerdict::Allowed => {}
                    GrantVerdict::Blocked { by } => {
                        tracing::info!(%community, member = %member.id, %role, ?by, "blocked");
                        report.blocked += 1;
                        if self.revoke(member, role, report).await? {
                            follow_ups.push(Step::Lost { role });
                        }
                        return Ok(follow_ups);
                    }
                    GrantVerdict::Deferred { by } => {
                        report.deferred += 1;
                        self.defer(member, role, &by, at).await?;
                        if self.revoke(member, role, report).await? {
                            follow_ups.push(Step::Lost { role });
                        }
                        return Ok(follow_ups);
                    }
                }
            }

            for rule in self.rules.conditionals_for_community(community).await? {
                if rule.is_deferred_by(role) && member.has_role(rule.role) {
                    report.deferred += 1;
                    self.defer(member, rule.role, &[role], at).await?;
                    if self.revoke(member, rule.role, report).await? {
                        follow_ups.push(Step::Lost { role: rule.role });
                    }
                }
            }
        }

        if !member.has_role(role) {
            return Ok(follow_ups);
        }
        for rule in self.rules.rules_for_community(community).await? {
            if !rule.is_triggered_by(role) {
                continue;
            }
            let grants: Vec<RoleId> = rule.missing_grants(member).collect();
            let revokes: Vec<RoleId> = rule.pending_revokes(member).collect();
            for target in grants {
                if self.grant_in_chain(member, target, at, report).await? {
                    follow_ups.push(Step::Gained {
                        role: target,
                        external: true,
                    });
                }
            }
            for target in revokes {
                if self.revoke(member, target, report).await? {
                    follow_ups.push(Step::Lost { role: target });
                }
            }
        }
        Ok(follow_ups)
    }

    async fn on_lost(
        &self,
        member: &mut Member,
        role: RoleId,
        at: Timestamp,
        report: &mut RuleReport,
    ) -> Result<Vec<Step>, WardenError> {
        let mut follow_ups = Vec::new();
        let pending = self
            .deferrals
            .list_for_member(member.community, member.id)
            .await?;
        for grant in pending {
            let waits_on_role = self
                .rules
                .get_conditional(member.community, grant.role)
                .await?
                .is_none_or(|rule| rule.is_deferred_by(role));
            if !waits_on_role {
                continue;
            }
            if self.attempt_deferred(member, &grant, at, report).await? == DeferralOutcome::Granted {
                follow_ups.push(Step::Gained {
                    role: grant.role,
                    external: false,
                });
            }
        }
        Ok(follow_ups)
    }

    /// Conditional gate followed by the grant itself.
    async fn grant_checked(
        &self,
        member: &mut Member,
        role: RoleId,
        at: Timestamp,
        report: &mut RuleReport,
    ) -> Result<GrantDecision, WardenError> {
        if member.has_role(role) {
            return Ok(GrantDecision::AlreadyHeld);
        }
        if let Some(rule) = self.rules.get_conditional(member.community, role).await? {
            match rule.verdict_for(member) {
                GrantVerdict::Allowed => {}
                GrantVerdict::Blocked { by } => {
                    tracing::info!(community = %member.community, member = %member.id, %role, ?by, "blocked");
                    report.blocked += 1;
                    return Ok(GrantDecision::Blocked { by });
                }
                GrantVerdict::Deferred { by } => {
                    report.deferred += 1;
                    self.defer(member, role, &by, at).await?;
                    return Ok(GrantDecision::Deferred { by });
                }
            }
        }
        self.executor
            .grant_role(member.community, member.id, role)
            .await?;
        member.roles.insert(role);
        report.granted += 1;
        Ok(GrantDecision::Granted)
    }

    /// [`RuleEngine::grant_checked`] inside a chain or sweep: a rejected grant
    /// is counted and the chain moves on.
    async fn grant_in_chain(
        &self,
        member: &mut Member,
        role: RoleId,
        at: Timestamp,
        report: &mut RuleReport,
    ) -> Result<bool, WardenError> {
        match self.grant_checked(member, role, at, report).await {
            Ok(decision) => Ok(decision == GrantDecision::Granted),
            Err(err) if is_side_effect_failure(&err) => {
                tracing::warn!(member = %member.id, %role, error = ?err, "grant failed");
                report.failed += 1;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns whether the role was actually removed.
    async fn revoke(
        &self,
        member: &mut Member,
        role: RoleId,
        report: &mut RuleReport,
    ) -> Result<bool, WardenError> {
        if !member.has_role(role) {
            return Ok(false);
        }
        match self
            .executor
            .revoke_role(member.community, member.id, role)
            .await
        {
            Ok(()) => {
                member.roles.remove(&role);
                report.revoked += 1;
                Ok(true)
            }
            Err(err) if is_side_effect_failure(&err) => {
                tracing::warn!(member = %member.id, %role, error = ?err, "revoke failed");
                report.failed += 1;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn defer(
        &self,
        member: &Member,
        role: RoleId,
        by: &[RoleId],
        at: Timestamp,
    ) -> Result<(), WardenError> {
        let grant = DeferredGrant::new(member.community, member.id, role, at);
        let recheck_at = grant.expires_at(self.config.deferral_horizon) + delta(Duration::from_secs(1));
        if self.deferrals.insert_if_absent(grant).await? {
            tracing::info!(community = %member.community, member = %member.id, %role, ?by, "deferred");
            let task = ScheduledTask::new(
                Some(member.community),
                recheck_at,
                TaskPayload::DeferralRecheck {
                    member: member.id,
                    role,
                },
            );
            self.tasks.create(task).await?;
        }
        Ok(())
    }

    async fn attempt_deferred(
        &self,
        member: &mut Member,
        grant: &DeferredGrant,
        at: Timestamp,
        report: &mut RuleReport,
    ) -> Result<DeferralOutcome, WardenError> {
        let (community, role) = (grant.community, grant.role);
        if grant.is_expired(at, self.config.deferral_horizon) {
            self.deferrals.remove(community, member.id, role).await?;
            tracing::info!(%community, member = %member.id, %role, queued_at = %grant.queued_at, "expired");
            report.expired += 1;
            return Ok(DeferralOutcome::Expired);
        }
        if member.has_role(role) {
            self.deferrals.remove(community, member.id, role).await?;
            return Ok(DeferralOutcome::Dropped);
        }
        if let Some(rule) = self.rules.get_conditional(community, role).await? {
            if rule.verdict_for(member) != GrantVerdict::Allowed {
                return Ok(DeferralOutcome::Pending);
            }
        }
        match self.executor.grant_role(community, member.id, role).await {
            Ok(()) => {
                member.roles.insert(role);
                self.deferrals.remove(community, member.id, role).await?;
                tracing::info!(%community, member = %member.id, %role, "deferred grant applied");
                report.granted += 1;
                Ok(DeferralOutcome::Granted)
            }
            Err(err) if is_side_effect_failure(&err) => {
                tracing::warn!(member = %member.id, %role, error = ?err, "deferred grant failed");
                report.failed += 1;
                Ok(DeferralOutcome::Pending)
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> Result<Member, WardenError> {
        self.executor
            .get_member(community, member)
            .await?
            .ok_or_else(|| {
                guildwarden_domain::error::NotFoundError {
                    entity: "Member",
                    id: member.to_string(),
                }
                .into()
            })
    }
}
