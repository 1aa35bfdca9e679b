//! `SQLite` implementation of [`TaskLogStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use guildwarden_app::ports::TaskLogStore;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::{LogEntryId, TaskId};
use guildwarden_domain::task_log::TaskLogEntry;

use crate::codec::{decode, from_snowflake, parse_timestamp, snowflake, timestamp};
use crate::error::StorageError;

struct Wrapper(TaskLogEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let task_id: Option<uuid::Uuid> = row.try_get("task_id")?;
        let community: Option<i64> = row.try_get("community")?;
        let started_at: String = row.try_get("started_at")?;
        let finished_at: String = row.try_get("finished_at")?;
        let status: String = row.try_get("status")?;

        Ok(Self(TaskLogEntry {
            id: LogEntryId::from_uuid(id),
            task_ref: row.try_get("task_ref")?,
            task_id: task_id.map(TaskId::from_uuid),
            community: community.map(from_snowflake),
            started_at: parse_timestamp(&started_at)?,
            finished_at: parse_timestamp(&finished_at)?,
            status: status.parse().map_err(decode)?,
            error_detail: row.try_get("error_detail")?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO task_logs (id, task_ref, task_id, community, started_at, finished_at, status, error_detail)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_RECENT: &str = r"
    SELECT * FROM task_logs
    WHERE ?1 IS NULL OR task_ref = ?1
    ORDER BY started_at DESC, rowid DESC
    LIMIT ?2
";

/// Append-only `SQLite` task log.
pub struct SqliteTaskLogStore {
    pool: SqlitePool,
}

impl SqliteTaskLogStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TaskLogStore for SqliteTaskLogStore {
    async fn append(&self, entry: TaskLogEntry) -> Result<TaskLogEntry, WardenError> {
        sqlx::query(INSERT)
            .bind(entry.id.as_uuid())
            .bind(&entry.task_ref)
            .bind(entry.task_id.map(TaskId::as_uuid))
            .bind(entry.community.map(|c| snowflake(c.get())))
            .bind(timestamp(entry.started_at))
            .bind(timestamp(entry.finished_at))
            .bind(entry.status.as_str())
            .bind(&entry.error_detail)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(entry)
    }

    async fn recent(
        &self,
        task_ref: Option<String>,
        limit: usize,
    ) -> Result<Vec<TaskLogEntry>, WardenError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(task_ref)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::memory_pool;
    use guildwarden_domain::id::CommunityId;
    use guildwarden_domain::task_log::TaskStatus;
    use guildwarden_domain::time::now;

    #[tokio::test]
    async fn should_return_newest_entries_first() {
        let store = SqliteTaskLogStore::new(memory_pool().await);
        let at = now();
        for offset in 0..3 {
            let started = at + chrono::TimeDelta::seconds(offset);
            store
                .append(TaskLogEntry::started("sweep", started).finish(started, TaskStatus::Ok, None))
                .await
                .unwrap();
        }

        let recent = store.recent(None, 2).await.unwrap();

        assert_eq!(recent.len(), 2);
        assert!(recent[0].started_at > recent[1].started_at);
    }

    #[tokio::test]
    async fn should_filter_by_task_ref_and_keep_error_detail() {
        let store = SqliteTaskLogStore::new(memory_pool().await);
        let at = now();
        let failed = TaskLogEntry::started("alarm", at)
            .with_task(TaskId::new())
            .with_community(Some(CommunityId::new(9)))
            .finish(at, TaskStatus::Error, Some("forbidden: missing permissions".into()));
        store.append(failed.clone()).await.unwrap();
        store
            .append(TaskLogEntry::started("sweep", at).finish(at, TaskStatus::Ok, None))
            .await
            .unwrap();

        let alarms = store.recent(Some("alarm".into()), 10).await.unwrap();

        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].id, failed.id);
        assert_eq!(alarms[0].status, TaskStatus::Error);
        assert_eq!(alarms[0].error_detail, failed.error_detail);
        assert_eq!(alarms[0].community, Some(CommunityId::new(9)));
    }
}
