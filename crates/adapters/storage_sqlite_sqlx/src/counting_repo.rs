//! `SQLite` implementation of [`CountingRepository`].
//!
//! Saves are compare-and-swap on the `version` column.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use guildwarden_app::ports::CountingRepository;
use guildwarden_domain::counting::CountingState;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{ChannelId, CommunityId};

use crate::codec::{from_millis, from_snowflake, millis, snowflake};
use crate::error::StorageError;

struct Wrapper(CountingState);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let last_poster: Option<i64> = row.try_get("last_poster")?;
        let penalty_role: Option<i64> = row.try_get("penalty_role")?;
        let current_number: i64 = row.try_get("current_number")?;
        let reset_value: i64 = row.try_get("reset_value")?;
        let version: i64 = row.try_get("version")?;

        Ok(Self(CountingState {
            community: from_snowflake(row.try_get("community")?),
            channel: from_snowflake(row.try_get("channel")?),
            current_number: current_number.cast_unsigned(),
            last_poster: last_poster.map(from_snowflake),
            penalty_role: penalty_role.map(from_snowflake),
            penalty_duration: from_millis(row.try_get("penalty_ms")?)?,
            reset_value: reset_value.cast_unsigned(),
            enabled: row.try_get("enabled")?,
            version: version.cast_unsigned(),
        }))
    }
}

const INSERT_NEW: &str = r"
    INSERT INTO counting_state
        (channel, community, current_number, last_poster, penalty_role, penalty_ms, reset_value, enabled, version)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (channel) DO NOTHING
";

const UPDATE_IF_VERSION: &str = r"
    UPDATE counting_state
    SET community = ?, current_number = ?, last_poster = ?, penalty_role = ?, penalty_ms = ?,
        reset_value = ?, enabled = ?, version = ?
    WHERE channel = ? AND version = ?
";

/// `SQLite`-backed counting channel state.
pub struct SqliteCountingRepository {
    pool: SqlitePool,
}

impl SqliteCountingRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CountingRepository for SqliteCountingRepository {
    async fn get(&self, channel: ChannelId) -> Result<Option<CountingState>, WardenError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM counting_state WHERE channel = ?")
            .bind(snowflake(channel.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn save_if_version(
        &self,
        state: CountingState,
        expected_version: u64,
    ) -> Result<bool, WardenError> {
        let last_poster = state.last_poster.map(|u| snowflake(u.get()));
        let penalty_role = state.penalty_role.map(|r| snowflake(r.get()));

        let result = if expected_version == 0 {
            sqlx::query(INSERT_NEW)
                .bind(snowflake(state.channel.get()))
                .bind(snowflake(state.community.get()))
                .bind(state.current_number.cast_signed())
                .bind(last_poster)
                .bind(penalty_role)
                .bind(millis(state.penalty_duration))
                .bind(state.reset_value.cast_signed())
                .bind(state.enabled)
                .bind(state.version.cast_signed())
                .execute(&self.pool)
                .await
        } else {
            sqlx::query(UPDATE_IF_VERSION)
                .bind(snowflake(state.community.get()))
                .bind(state.current_number.cast_signed())
                .bind(last_poster)
                .bind(penalty_role)
                .bind(millis(state.penalty_duration))
                .bind(state.reset_value.cast_signed())
                .bind(state.enabled)
                .bind(state.version.cast_signed())
                .bind(snowflake(state.channel.get()))
                .bind(expected_version.cast_signed())
                .execute(&self.pool)
                .await
        }
        .map_err(StorageError::from)?;

        let saved = result.rows_affected() == 1;
        if !saved {
            tracing::debug!(channel = %state.channel, expected_version, "counting save lost the race");
        }
        Ok(saved)
    }

    async fn list_for_community(
        &self,
        community: CommunityId,
    ) -> Result<Vec<CountingState>, WardenError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM counting_state WHERE community = ? ORDER BY channel")
                .bind(snowflake(community.get()))
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn delete(&self, channel: ChannelId) -> Result<bool, WardenError> {
        let result = sqlx::query("DELETE FROM counting_state WHERE channel = ?")
            .bind(snowflake(channel.get()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::memory_pool;
    use guildwarden_domain::id::{RoleId, UserId};
    use std::time::Duration;

    fn state() -> CountingState {
        let mut state = CountingState::new(CommunityId::new(1), ChannelId::new(7));
        state.penalty_role = Some(RoleId::new(8));
        state.penalty_duration = Duration::from_secs(600);
        state.version = 1;
        state
    }

    #[tokio::test]
    async fn should_insert_only_when_absent() {
        let repo = SqliteCountingRepository::new(memory_pool().await);

        assert!(repo.save_if_version(state(), 0).await.unwrap());
        assert!(!repo.save_if_version(state(), 0).await.unwrap());
        assert_eq!(repo.get(ChannelId::new(7)).await.unwrap(), Some(state()));
    }

    #[tokio::test]
    async fn should_reject_save_with_stale_version() {
        let repo = SqliteCountingRepository::new(memory_pool().await);
        repo.save_if_version(state(), 0).await.unwrap();

        let mut next = state();
        next.current_number = 1;
        next.last_poster = Some(UserId::new(3));
        next.version = 2;
        assert!(repo.save_if_version(next.clone(), 1).await.unwrap());

        let mut stale = state();
        stale.current_number = 5;
        stale.version = 2;
        assert!(!repo.save_if_version(stale, 1).await.unwrap());

        assert_eq!(repo.get(ChannelId::new(7)).await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn should_list_and_delete_channels() {
        let repo = SqliteCountingRepository::new(memory_pool().await);
        repo.save_if_version(state(), 0).await.unwrap();

        assert_eq!(repo.list_for_community(CommunityId::new(1)).await.unwrap().len(), 1);
        assert!(repo.delete(ChannelId::new(7)).await.unwrap());
        assert!(repo.get(ChannelId::new(7)).await.unwrap().is_none());
    }
}
