//! Task scheduler — claims due tasks on every tick and dispatches them on a
//! bounded worker pool.
//!
//! Recurring tasks are moved to their next slot before they are dispatched,
//! so a crash mid-dispatch never fires the same slot twice and a long
//! downtime never produces a burst of catch-up runs. Every outcome lands in
//! the task log.

mod dispatch;

pub use dispatch::{DeferralRecheck, PlatformDispatcher};

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::id::TaskId;
use guildwarden_domain::task::ScheduledTask;
use guildwarden_domain::task_log::{TaskLogEntry, TaskStatus};
use guildwarden_domain::time::{Timestamp, now};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::executor::describe;
use crate::ports::{TaskLogStore, TaskRepository};

/// Performs the side effect of one task.
pub trait TaskDispatcher {
    fn dispatch(
        &self,
        task: &ScheduledTask,
    ) -> impl Future<Output = Result<(), WardenError>> + Send;
}

impl<T: TaskDispatcher + Send + Sync> TaskDispatcher for Arc<T> {
    fn dispatch(
        &self,
        task: &ScheduledTask,
    ) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).dispatch(task)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub dispatch_timeout: Duration,
    /// Dispatches running at the same time.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            dispatch_timeout: Duration::from_secs(30),
            workers: 16,
        }
    }
}

/// What one [`Scheduler::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

type InFlight = Arc<Mutex<HashSet<TaskId>>>;

/// Removes a task from the in-flight set when its dispatch ends, panics
/// included.
struct Claim {
    in_flight: InFlight,
    id: TaskId,
}

impl Claim {
    fn take(in_flight: &InFlight, id: TaskId) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        set.insert(id).then(|| Self {
            in_flight: Arc::clone(in_flight),
            id,
        })
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub struct Scheduler<T, L, D> {
    tasks: T,
    logs: L,
    dispatcher: Arc<D>,
    config: SchedulerConfig,
    workers: Arc<Semaphore>,
    in_flight: InFlight,
}

impl<T, L, D> Scheduler<T, L, D>
where
    T: TaskRepository + Clone + Send + Sync + 'static,
    L: TaskLogStore + Clone + Send + Sync + 'static,
    D: TaskDispatcher + Send + Sync + 'static,
{
    pub fn new(tasks: T, logs: L, dispatcher: Arc<D>, config: SchedulerConfig) -> Self {
        Self {
            tasks,
            logs,
            dispatcher,
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            config,
            in_flight: Arc::default(),
        }
    }

    /// Validate and persist a task.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Validation`] for a malformed task, or a storage
    /// error.
    #[tracing::instrument(skip(self, task), fields(kind = %task.kind, due = %task.due_time))]
    pub async fn schedule(&self, task: ScheduledTask) -> Result<TaskId, WardenError> {
        task.validate()?;
        let created = self.tasks.create(task).await?;
        tracing::info!(task = %created.id, "task scheduled");
        Ok(created.id)
    }

    /// Mark a task cancelled. A dispatch already running finishes; the task
    /// never fires again.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: TaskId) -> Result<bool, WardenError> {
        self.tasks.cancel(id).await
    }

    /// Stored tasks ordered by due time.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn pending(&self) -> Result<Vec<ScheduledTask>, WardenError> {
        self.tasks.list().await
    }

    /// Number of dispatches currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Claim and dispatch every task due at `at`, waiting for the
    /// dispatches to finish.
    ///
    /// A task whose row cannot be rescheduled or removed is left for the
    /// next tick and logged as an error; the other due tasks still run.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the due tasks cannot be loaded; dispatch
    /// failures are logged and counted.
    pub async fn tick(&self, at: Timestamp) -> Result<TickReport, WardenError> {
        let mut report = TickReport::default();
        let mut running = JoinSet::new();

        for task in self.tasks.due(at).await? {
            let Some(claim) = Claim::take(&self.in_flight, task.id) else {
                continue;
            };
            if task.cancelled {
                match self.skip(&task).await {
                    Ok(()) => report.skipped += 1,
                    Err(err) => {
                        self.storage_failed(&task, "remove cancelled task", &err).await;
                        report.failed += 1;
                    }
                }
                continue;
            }
            let one_shot = match task.recurrence.next_due_after(task.due_time, at) {
                Some(next) => {
                    let mut rescheduled = task.clone();
                    rescheduled.due_time = next;
                    if let Err(err) = self.tasks.update(rescheduled).await {
                        self.storage_failed(&task, "reschedule", &err).await;
                        report.failed += 1;
                        continue;
                    }
                    false
                }
                None => true,
            };
            report.dispatched += 1;
            running.spawn(self.run_one(task, one_shot, claim));
        }

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok(TaskStatus::Ok) => report.succeeded += 1,
                Ok(_) => report.failed += 1,
                Err(err) => {
                    tracing::error!(error = %err, "dispatch worker panicked");
                    report.failed += 1;
                }
            }
        }
        if report != TickReport::default() {
            tracing::debug!(?report, "tick finished");
        }
        Ok(report)
    }

    /// Tick every `tick_interval` until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        tracing::info!(interval = ?self.config.tick_interval, "scheduler started");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(err) = self.tick(now()).await {
                        tracing::error!(error = ?err, "scheduler tick failed");
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
    }

    async fn skip(&self, task: &ScheduledTask) -> Result<(), WardenError> {
        tracing::debug!(task = %task.id, kind = %task.kind, "skipping cancelled task");
        self.tasks.delete(task.id).await?;
        let at = now();
        let entry = TaskLogEntry::started(task.task_ref(), at)
            .with_task(task.id)
            .with_community(task.community)
            .finish(at, TaskStatus::Skipped, Some("cancelled".to_string()));
        record(&self.logs, entry).await;
        Ok(())
    }

    async fn storage_failed(&self, task: &ScheduledTask, step: &str, err: &WardenError) {
        tracing::error!(task = %task.id, kind = %task.kind, step, error = ?err, "task storage failed");
        let at = now();
        let entry = TaskLogEntry::started(task.task_ref(), at)
            .with_task(task.id)
            .with_community(task.community)
            .finish(at, TaskStatus::Error, Some(format!("{step}: {}", describe(err))));
        record(&self.logs, entry).await;
    }

    fn run_one(
        &self,
        task: ScheduledTask,
        one_shot: bool,
        claim: Claim,
    ) -> impl Future<Output = TaskStatus> + Send + use<T, L, D> {
        let tasks = self.tasks.clone();
        let logs = self.logs.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let workers = Arc::clone(&self.workers);
        let timeout = self.config.dispatch_timeout;
        async move {
            let _claim = claim;
            let Ok(_permit) = workers.acquire_owned().await else {
                return TaskStatus::Error;
            };
            let started = now();
            let (status, detail) =
                match tokio::time::timeout(timeout, dispatcher.dispatch(&task)).await {
                    Ok(Ok(())) => (TaskStatus::Ok, None),
                    Ok(Err(err)) => (TaskStatus::Error, Some(describe(&err))),
                    Err(_) => (TaskStatus::Error, Some(format!("timed out after {timeout:?}"))),
                };
            match status {
                TaskStatus::Ok => tracing::debug!(task = %task.id, kind = %task.kind, "task dispatched"),
                _ => tracing::warn!(task = %task.id, kind = %task.kind, detail = ?detail, "task failed"),
            }
            if one_shot {
                if let Err(err) = tasks.delete(task.id).await {
                    tracing::warn!(task = %task.id, error = ?err, "failed to delete finished task");
                }
            }
            let entry = TaskLogEntry::started(task.task_ref(), started)
                .with_task(task.id)
                .with_community(task.community)
                .finish(now(), status, detail);
            record(&logs, entry).await;
            status
        }
    }
}

async fn record(logs: &impl TaskLogStore, entry: TaskLogEntry) {
    if let Err(err) = logs.append(entry).await {
        tracing::warn!(error = ?err, "failed to write task log");
    }
}
