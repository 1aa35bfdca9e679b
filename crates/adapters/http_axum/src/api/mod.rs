//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod task_logs;
#[allow(clippy::missing_errors_doc)]
pub mod tasks;

use axum::Router;
use axum::routing::get;

use guildwarden_app::ports::{TaskLogStore, TaskRepository};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<T, L>() -> Router<AppState<T, L>>
where
    T: TaskRepository + Send + Sync + 'static,
    L: TaskLogStore + Send + Sync + 'static,
{
    Router::new()
        .route("/task-logs", get(task_logs::list::<T, L>))
        .route("/tasks", get(tasks::list::<T, L>))
}
