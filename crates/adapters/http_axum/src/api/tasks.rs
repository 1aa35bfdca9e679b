//! `GET /api/tasks` — tasks waiting in the scheduler.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use guildwarden_app::ports::{TaskLogStore, TaskRepository};
use guildwarden_domain::task::ScheduledTask;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<ScheduledTask>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/tasks` — every stored task ordered by due time.
pub async fn list<T, L>(State(state): State<AppState<T, L>>) -> Result<ListResponse, ApiError>
where
    T: TaskRepository + Send + Sync + 'static,
    L: TaskLogStore + Send + Sync + 'static,
{
    let tasks = state.diagnostics.pending_tasks().await?;
    Ok(ListResponse::Ok(Json(tasks)))
}
