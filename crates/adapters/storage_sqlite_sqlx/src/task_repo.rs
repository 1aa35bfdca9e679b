//! `SQLite` implementation of [`TaskRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use guildwarden_app::ports::TaskRepository;
use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::TaskId;
use guildwarden_domain::task::ScheduledTask;
use guildwarden_domain::time::Timestamp;

use crate::codec::{decode, from_json, from_snowflake, parse_timestamp, snowflake, timestamp, to_json};
use crate::error::StorageError;

struct Wrapper(ScheduledTask);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let community: Option<i64> = row.try_get("community")?;
        let kind: String = row.try_get("kind")?;
        let due_time: String = row.try_get("due_time")?;
        let recurrence: String = row.try_get("recurrence")?;
        let payload: String = row.try_get("payload")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(ScheduledTask {
            id: TaskId::from_uuid(id),
            community: community.map(from_snowflake),
            kind: kind.parse().map_err(decode)?,
            due_time: parse_timestamp(&due_time)?,
            recurrence: from_json(&recurrence)?,
            payload: from_json(&payload)?,
            cancelled: row.try_get("cancelled")?,
            created_at: parse_timestamp(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO scheduled_tasks (id, community, kind, due_time, recurrence, payload, cancelled, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

// A concurrent cancel must survive a reschedule.
const UPDATE: &str = r"
    UPDATE scheduled_tasks
    SET community = ?, kind = ?, due_time = ?, recurrence = ?, payload = ?, cancelled = cancelled OR ?
    WHERE id = ?
    RETURNING cancelled
";

const SELECT_DUE: &str =
    "SELECT * FROM scheduled_tasks WHERE due_time <= ? ORDER BY due_time, created_at";
const SELECT_ALL: &str = "SELECT * FROM scheduled_tasks ORDER BY due_time, created_at";

/// `SQLite`-backed task store.
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: ScheduledTask) -> Result<ScheduledTask, WardenError> {
        sqlx::query(INSERT)
            .bind(task.id.as_uuid())
            .bind(task.community.map(|c| snowflake(c.get())))
            .bind(task.kind.as_str())
            .bind(timestamp(task.due_time))
            .bind(to_json(&task.recurrence)?)
            .bind(to_json(&task.payload)?)
            .bind(task.cancelled)
            .bind(timestamp(task.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Option<ScheduledTask>, WardenError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM scheduled_tasks WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn due(&self, now: Timestamp) -> Result<Vec<ScheduledTask>, WardenError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_DUE)
            .bind(timestamp(now))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn list(&self) -> Result<Vec<ScheduledTask>, WardenError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, mut task: ScheduledTask) -> Result<ScheduledTask, WardenError> {
        let cancelled: Option<(bool,)> = sqlx::query_as(UPDATE)
            .bind(task.community.map(|c| snowflake(c.get())))
            .bind(task.kind.as_str())
            .bind(timestamp(task.due_time))
            .bind(to_json(&task.recurrence)?)
            .bind(to_json(&task.payload)?)
            .bind(task.cancelled)
            .bind(task.id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if let Some((cancelled,)) = cancelled {
            task.cancelled = cancelled;
        }
        Ok(task)
    }

    async fn cancel(&self, id: TaskId) -> Result<bool, WardenError> {
        let result = sqlx::query("UPDATE scheduled_tasks SET cancelled = 1 WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: TaskId) -> Result<bool, WardenError> {
        let result = sqlx::query("DELETE FROM scheduled_tasks WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
