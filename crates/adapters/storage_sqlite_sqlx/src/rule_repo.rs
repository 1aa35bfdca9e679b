//! `SQLite` implementation of [`RuleRepository`].

use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use guildwarden_app::ports::RuleRepository;
use guildwarden_domain::automation::{
    AutomationRule, ChannelRestriction, ConditionalRoleRule, RestrictionScope,
};
use guildwarden_domain::error::{ValidationError, WardenError};
use guildwarden_domain::id::{ChannelId, CommunityId, RestrictionId, RoleId, RuleId};

use crate::codec::{decode, from_json, from_millis, from_snowflake, millis, snowflake, to_json};
use crate::error::{StorageError, is_unique_violation};

struct RuleRow(AutomationRule);

impl<'r> FromRow<'r, SqliteRow> for RuleRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let roles_to_add: String = row.try_get("roles_to_add")?;
        let roles_to_remove: String = row.try_get("roles_to_remove")?;

        Ok(Self(AutomationRule {
            id: RuleId::from_uuid(id),
            community: from_snowflake(row.try_get("community")?),
            name: row.try_get("name")?,
            trigger_role: from_snowflake(row.try_get("trigger_role")?),
            roles_to_add: from_json(&roles_to_add)?,
            roles_to_remove: from_json(&roles_to_remove)?,
        }))
    }
}

struct ConditionalRow(ConditionalRoleRule);

impl<'r> FromRow<'r, SqliteRow> for ConditionalRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let blocking: String = row.try_get("blocking_roles")?;
        let deferral: String = row.try_get("deferral_roles")?;
        let blocking_roles: BTreeSet<RoleId> = from_json(&blocking)?;
        let deferral_roles: BTreeSet<RoleId> = from_json(&deferral)?;

        Ok(Self(ConditionalRoleRule {
            community: from_snowflake(row.try_get("community")?),
            role: from_snowflake(row.try_get("role")?),
            blocking_roles,
            deferral_roles,
        }))
    }
}

struct RestrictionRow(ChannelRestriction);

impl<'r> FromRow<'r, SqliteRow> for RestrictionRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let threshold: Option<i64> = row.try_get("threshold_ms")?;
        let scope: String = row.try_get("scope")?;

        Ok(Self(ChannelRestriction {
            id: RestrictionId::from_uuid(id),
            community: from_snowflake(row.try_get("community")?),
            channel: from_snowflake(row.try_get("channel")?),
            gating_role: from_snowflake(row.try_get("gating_role")?),
            threshold: threshold.map(from_millis).transpose()?,
            scope: scope.parse().map_err(decode)?,
        }))
    }
}

const INSERT_RULE: &str = r"
    INSERT INTO automation_rules (id, community, name, trigger_role, roles_to_add, roles_to_remove)
    VALUES (?, ?, ?, ?, ?, ?)
";

const UPDATE_RULE: &str = r"
    UPDATE automation_rules
    SET name = ?, trigger_role = ?, roles_to_add = ?, roles_to_remove = ?
    WHERE id = ?
";

const UPSERT_CONDITIONAL: &str = r"
    INSERT INTO conditional_roles (community, role, blocking_roles, deferral_roles)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (community, role) DO UPDATE
    SET blocking_roles = excluded.blocking_roles, deferral_roles = excluded.deferral_roles
";

const INSERT_RESTRICTION: &str = r"
    INSERT INTO channel_restrictions (id, community, channel, gating_role, threshold_ms, scope)
    VALUES (?, ?, ?, ?, ?, ?)
";

/// `SQLite`-backed store for autorole, conditional-role and restriction rules.
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create_rule(&self, rule: AutomationRule) -> Result<AutomationRule, WardenError> {
        let result = sqlx::query(INSERT_RULE)
            .bind(rule.id.as_uuid())
            .bind(snowflake(rule.community.get()))
            .bind(&rule.name)
            .bind(snowflake(rule.trigger_role.get()))
            .bind(to_json(&rule.roles_to_add)?)
            .bind(to_json(&rule.roles_to_remove)?)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(rule),
            Err(err) if is_unique_violation(&err) => {
                Err(ValidationError::DuplicateName(rule.name).into())
            }
            Err(err) => Err(StorageError::from(err).into()),
        }
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<AutomationRule>, WardenError> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM automation_rules WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.0))
    }

    async fn rules_for_community(
        &self,
        community: CommunityId,
    ) -> Result<Vec<AutomationRule>, WardenError> {
        let rows: Vec<RuleRow> =
            sqlx::query_as("SELECT * FROM automation_rules WHERE community = ? ORDER BY name")
                .bind(snowflake(community.get()))
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn update_rule(&self, rule: AutomationRule) -> Result<AutomationRule, WardenError> {
        let result = sqlx::query(UPDATE_RULE)
            .bind(&rule.name)
            .bind(snowflake(rule.trigger_role.get()))
            .bind(to_json(&rule.roles_to_add)?)
            .bind(to_json(&rule.roles_to_remove)?)
            .bind(rule.id.as_uuid())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(rule),
            Err(err) if is_unique_violation(&err) => {
                Err(ValidationError::DuplicateName(rule.name).into())
            }
            Err(err) => Err(StorageError::from(err).into()),
        }
    }

    async fn delete_rule(&self, id: RuleId) -> Result<bool, WardenError> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_conditional(
        &self,
        rule: ConditionalRoleRule,
    ) -> Result<ConditionalRoleRule, WardenError> {
        sqlx::query(UPSERT_CONDITIONAL)
            .bind(snowflake(rule.community.get()))
            .bind(snowflake(rule.role.get()))
            .bind(to_json(&rule.blocking_roles)?)
            .bind(to_json(&rule.deferral_roles)?)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rule)
    }

    async fn get_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> Result<Option<ConditionalRoleRule>, WardenError> {
        let row: Option<ConditionalRow> =
            sqlx::query_as("SELECT * FROM conditional_roles WHERE community = ? AND role = ?")
                .bind(snowflake(community.get()))
                .bind(snowflake(role.get()))
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|r| r.0))
    }

    async fn conditionals_for_community(
        &self,
        community: CommunityId,
    ) -> Result<Vec<ConditionalRoleRule>, WardenError> {
        let rows: Vec<ConditionalRow> =
            sqlx::query_as("SELECT * FROM conditional_roles WHERE community = ? ORDER BY role")
                .bind(snowflake(community.get()))
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn delete_conditional(
        &self,
        community: CommunityId,
        role: RoleId,
    ) -> Result<bool, WardenError> {
        let result = sqlx::query("DELETE FROM conditional_roles WHERE community = ? AND role = ?")
            .bind(snowflake(community.get()))
            .bind(snowflake(role.get()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_restriction(
        &self,
        restriction: ChannelRestriction,
    ) -> Result<ChannelRestriction, WardenError> {
        sqlx::query(INSERT_RESTRICTION)
            .bind(restriction.id.as_uuid())
            .bind(snowflake(restriction.community.get()))
            .bind(snowflake(restriction.channel.get()))
            .bind(snowflake(restriction.gating_role.get()))
            .bind(restriction.threshold.map(millis))
            .bind(restriction.scope.as_str())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(restriction)
    }

    async fn restrictions_for_channel(
        &self,
        channel: ChannelId,
        scope: RestrictionScope,
    ) -> Result<Vec<ChannelRestriction>, WardenError> {
        let rows: Vec<RestrictionRow> =
            sqlx::query_as("SELECT * FROM channel_restrictions WHERE channel = ? AND scope = ?")
                .bind(snowflake(channel.get()))
                .bind(scope.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn restrictions_for_community(
        &self,
        community: CommunityId,
    ) -> Result<Vec<ChannelRestriction>, WardenError> {
        let rows: Vec<RestrictionRow> = sqlx::query_as(
            "SELECT * FROM channel_restrictions WHERE community = ? ORDER BY channel, scope",
        )
        .bind(snowflake(community.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn delete_restriction(&self, id: RestrictionId) -> Result<bool, WardenError> {
        let result = sqlx::query("DELETE FROM channel_restrictions WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
