//! `SQLite` implementation of [`DeferralRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use guildwarden_app::ports::DeferralRepository;
use guildwarden_domain::automation::DeferredGrant;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{CommunityId, RoleId, UserId};

use crate::codec::{from_snowflake, parse_timestamp, snowflake, timestamp};
use crate::error::StorageError;

struct Wrapper(DeferredGrant);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let queued_at: String = row.try_get("queued_at")?;
        Ok(Self(DeferredGrant {
            community: from_snowflake(row.try_get("community")?),
            member: from_snowflake(row.try_get("member")?),
            role: from_snowflake(row.try_get("role")?),
            queued_at: parse_timestamp(&queued_at)?,
        }))
    }
}

const INSERT_IF_ABSENT: &str = r"
    INSERT INTO deferred_grants (community, member, role, queued_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (community, member, role) DO NOTHING
";

const SELECT_ONE: &str =
    "SELECT * FROM deferred_grants WHERE community = ? AND member = ? AND role = ?";
const SELECT_FOR_MEMBER: &str =
    "SELECT * FROM deferred_grants WHERE community = ? AND member = ? ORDER BY queued_at";
const SELECT_FOR_COMMUNITY: &str =
    "SELECT * FROM deferred_grants WHERE community = ? ORDER BY queued_at";
const DELETE_ONE: &str =
    "DELETE FROM deferred_grants WHERE community = ? AND member = ? AND role = ?";

/// `SQLite`-backed queue of pending conditional-role grants.
pub struct SqliteDeferralRepository {
    pool: SqlitePool,
}

impl SqliteDeferralRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeferralRepository for SqliteDeferralRepository {
    async fn insert_if_absent(&self, grant: DeferredGrant) -> Result<bool, WardenError> {
        let result = sqlx::query(INSERT_IF_ABSENT)
            .bind(snowflake(grant.community.get()))
            .bind(snowflake(grant.member.get()))
            .bind(snowflake(grant.role.get()))
            .bind(timestamp(grant.queued_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<Option<DeferredGrant>, WardenError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_ONE)
            .bind(snowflake(community.get()))
            .bind(snowflake(member.get()))
            .bind(snowflake(role.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn list_for_member(
        &self,
        community: CommunityId,
        member: UserId,
    ) -> Result<Vec<DeferredGrant>, WardenError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_FOR_MEMBER)
            .bind(snowflake(community.get()))
            .bind(snowflake(member.get()))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn list_for_community(
        &self,
        community: CommunityId,
    ) -> Result<Vec<DeferredGrant>, WardenError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_FOR_COMMUNITY)
            .bind(snowflake(community.get()))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn remove(
        &self,
        community: CommunityId,
        member: UserId,
        role: RoleId,
    ) -> Result<bool, WardenError> {
        let result = sqlx::query(DELETE_ONE)
            .bind(snowflake(community.get()))
            .bind(snowflake(member.get()))
            .bind(snowflake(role.get()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
