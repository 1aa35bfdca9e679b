//! Diagnostics service — read-only view of the task log and pending tasks.

use guildwarden_domain::error::WardenError;
use guildwarden_domain::task::ScheduledTask;
use guildwarden_domain::task_log::TaskLogEntry;

use crate::ports::{TaskLogStore, TaskRepository};

/// Entries returned when the caller does not ask for a count.
pub const DEFAULT_LOG_LIMIT: usize = 50;
/// Upper bound on entries returned by one query.
pub const MAX_LOG_LIMIT: usize = 500;

pub struct DiagnosticsService<T, L> {
    tasks: T,
    logs: L,
}

impl<T: TaskRepository, L: TaskLogStore> DiagnosticsService<T, L> {
    pub fn new(tasks: T, logs: L) -> Self {
        Self { tasks, logs }
    }

    /// Most recent log entries, newest first, optionally for one task label
    /// (`"alarm"`, `"sweep"`, ...). `limit` is clamped to
    /// `1..=MAX_LOG_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn recent_logs(
        &self,
        task: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<TaskLogEntry>, WardenError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        let task = task.map(str::trim).filter(|t| !t.is_empty()).map(String::from);
        self.logs.recent(task, limit).await
    }

    /// Every stored task ordered by due time.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn pending_tasks(&self) -> Result<Vec<ScheduledTask>, WardenError> {
        self.tasks.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryTaskLog, InMemoryTasks};
    use guildwarden_domain::task_log::TaskStatus;
    use guildwarden_domain::time::now;

    async fn seeded() -> DiagnosticsService<InMemoryTasks, InMemoryTaskLog> {
        let logs = InMemoryTaskLog::default();
        for (i, task_ref) in ["alarm", "sweep", "alarm", "reminder"].into_iter().enumerate() {
            let at = now() + chrono::TimeDelta::seconds(i64::try_from(i).unwrap());
            logs.append(TaskLogEntry::started(task_ref, at).finish(at, TaskStatus::Ok, None))
                .await
                .unwrap();
        }
        DiagnosticsService::new(InMemoryTasks::default(), logs)
    }

    #[tokio::test]
    async fn should_filter_logs_by_task_label() {
        let svc = seeded().await;
        let alarms = svc.recent_logs(Some("alarm"), None).await.unwrap();
        assert_eq!(alarms.len(), 2);
        assert!(alarms.iter().all(|e| e.task_ref == "alarm"));
    }

    #[tokio::test]
    async fn should_return_newest_first_within_limit() {
        let svc = seeded().await;
        let recent = svc.recent_logs(None, Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].task_ref, "reminder");
    }

    #[tokio::test]
    async fn should_treat_blank_filter_and_zero_limit_leniently() {
        let svc = seeded().await;
        let recent = svc.recent_logs(Some("  "), Some(0)).await.unwrap();
        assert_eq!(recent.len(), 1);
    }
}
