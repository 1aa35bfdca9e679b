//! Scheduler ports — persisted tasks and the append-only task log.

use std::future::Future;
use std::sync::Arc;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::TaskId;
use guildwarden_domain::task::ScheduledTask;
use guildwarden_domain::task_log::TaskLogEntry;
use guildwarden_domain::time::Timestamp;

/// Repository for [`ScheduledTask`]s.
pub trait TaskRepository {
    fn create(
        &self,
        task: ScheduledTask,
    ) -> impl Future<Output = Result<ScheduledTask, WardenError>> + Send;

    fn get(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<ScheduledTask>, WardenError>> + Send;

    /// Every task with `due_time <= now`, cancelled ones included, oldest
    /// first.
    fn due(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<ScheduledTask>, WardenError>> + Send;

    /// All stored tasks ordered by due time.
    fn list(&self) -> impl Future<Output = Result<Vec<ScheduledTask>, WardenError>> + Send;

    fn update(
        &self,
        task: ScheduledTask,
    ) -> impl Future<Output = Result<ScheduledTask, WardenError>> + Send;

    /// Flag a task as cancelled. Returns `false` when it does not exist.
    fn cancel(&self, id: TaskId) -> impl Future<Output = Result<bool, WardenError>> + Send;

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<bool, WardenError>> + Send;
}

/// Append-only store of [`TaskLogEntry`] records.
pub trait TaskLogStore {
    fn append(
        &self,
        entry: TaskLogEntry,
    ) -> impl Future<Output = Result<TaskLogEntry, WardenError>> + Send;

    /// Most recent entries first, optionally restricted to one `task_ref`.
    fn recent(
        &self,
        task_ref: Option<String>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLogEntry>, WardenError>> + Send;
}

impl<T: TaskRepository + Send + Sync> TaskRepository for Arc<T> {
    fn create(
        &self,
        task: ScheduledTask,
    ) -> impl Future<Output = Result<ScheduledTask, WardenError>> + Send {
        (**self).create(task)
    }

    fn get(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<ScheduledTask>, WardenError>> + Send {
        (**self).get(id)
    }

    fn due(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<ScheduledTask>, WardenError>> + Send {
        (**self).due(now)
    }

    fn list(&self) -> impl Future<Output = Result<Vec<ScheduledTask>, WardenError>> + Send {
        (**self).list()
    }

    fn update(
        &self,
        task: ScheduledTask,
    ) -> impl Future<Output = Result<ScheduledTask, WardenError>> + Send {
        (**self).update(task)
    }

    fn cancel(&self, id: TaskId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).cancel(id)
    }

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<bool, WardenError>> + Send {
        (**self).delete(id)
    }
}

impl<T: TaskLogStore + Send + Sync> TaskLogStore for Arc<T> {
    fn append(
        &self,
        entry: TaskLogEntry,
    ) -> impl Future<Output = Result<TaskLogEntry, WardenError>> + Send {
        (**self).append(entry)
    }

    fn recent(
        &self,
        task_ref: Option<String>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLogEntry>, WardenError>> + Send {
        (**self).recent(task_ref, limit)
    }
}
