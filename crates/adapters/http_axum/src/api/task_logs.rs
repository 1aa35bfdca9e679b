//! `GET /api/task-logs` — recent scheduler and maintenance runs.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use guildwarden_app::ports::{TaskLogStore, TaskRepository};
use guildwarden_domain::task_log::TaskLogEntry;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Task label such as `alarm` or `sweep`.
    pub task: Option<String>,
    pub limit: Option<usize>,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<TaskLogEntry>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/task-logs?task=&limit=` — newest entries first.
pub async fn list<T, L>(
    State(state): State<AppState<T, L>>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, ApiError>
where
    T: TaskRepository + Send + Sync + 'static,
    L: TaskLogStore + Send + Sync + 'static,
{
    let entries = state
        .diagnostics
        .recent_logs(query.task.as_deref(), query.limit)
        .await?;
    Ok(ListResponse::Ok(Json(entries)))
}
