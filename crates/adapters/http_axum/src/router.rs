//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use guildwarden_app::ports::{TaskLogStore, TaskRepository};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Serves `/health` and nests the API routes under `/api`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<T, L>(state: AppState<T, L>) -> Router
where
    T: TaskRepository + Send + Sync + 'static,
    L: TaskLogStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use guildwarden_app::services::DiagnosticsService;
    use guildwarden_domain::error::WardenError;
    use guildwarden_domain::id::{ChannelId, CommunityId, TaskId};
    use guildwarden_domain::task::{ScheduledTask, TaskPayload};
    use guildwarden_domain::task_log::{TaskLogEntry, TaskStatus};
    use guildwarden_domain::time::{Timestamp, now};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    struct StubTasks(Vec<ScheduledTask>);

    #[derive(Default)]
    struct StubLogs {
        queries: Mutex<Vec<(Option<String>, usize)>>,
    }

    struct FailingLogs;

    impl TaskRepository for StubTasks {
        async fn create(&self, task: ScheduledTask) -> Result<ScheduledTask, WardenError> {
            Ok(task)
        }
        async fn get(&self, _id: TaskId) -> Result<Option<ScheduledTask>, WardenError> {
            Ok(None)
        }
        async fn due(&self, _now: Timestamp) -> Result<Vec<ScheduledTask>, WardenError> {
            Ok(vec![])
        }
        async fn list(&self) -> Result<Vec<ScheduledTask>, WardenError> {
            Ok(self.0.clone())
        }
        async fn update(&self, task: ScheduledTask) -> Result<ScheduledTask, WardenError> {
            Ok(task)
        }
        async fn cancel(&self, _id: TaskId) -> Result<bool, WardenError> {
            Ok(false)
        }
        async fn delete(&self, _id: TaskId) -> Result<bool, WardenError> {
            Ok(false)
        }
    }

    impl TaskLogStore for StubLogs {
        async fn append(&self, entry: TaskLogEntry) -> Result<TaskLogEntry, WardenError> {
            Ok(entry)
        }
        async fn recent(
            &self,
            task_ref: Option<String>,
            limit: usize,
        ) -> Result<Vec<TaskLogEntry>, WardenError> {
            self.queries.lock().unwrap().push((task_ref.clone(), limit));
            let at = now();
            let entry = TaskLogEntry::started(task_ref.unwrap_or_else(|| "sweep".into()), at)
                .finish(at, TaskStatus::Ok, None);
            Ok(vec![entry])
        }
    }

    impl TaskLogStore for FailingLogs {
        async fn append(&self, entry: TaskLogEntry) -> Result<TaskLogEntry, WardenError> {
            Ok(entry)
        }
        async fn recent(
            &self,
            _task_ref: Option<String>,
            _limit: usize,
        ) -> Result<Vec<TaskLogEntry>, WardenError> {
            Err(WardenError::storage(std::io::Error::other("database is locked")))
        }
    }

    fn alarm() -> ScheduledTask {
        ScheduledTask::new(
            Some(CommunityId::new(1)),
            now(),
            TaskPayload::Alarm {
                channel: ChannelId::new(2),
                message: "standup".into(),
            },
        )
    }

    fn app() -> Router {
        build(AppState::new(DiagnosticsService::new(
            StubTasks(vec![alarm()]),
            StubLogs::default(),
        )))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let app = app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_list_pending_tasks() {
        let app = app();

        let (status, body) = get_json(app, "/api/tasks").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["kind"], "alarm");
        assert_eq!(body[0]["payload"]["message"], "standup");
    }

    #[tokio::test]
    async fn should_pass_filter_and_limit_when_listing_logs() {
        let app = app();

        let (status, body) = get_json(app, "/api/task-logs?task=alarm&limit=5").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["task_ref"], "alarm");
        assert_eq!(body[0]["status"], "ok");
    }

    #[tokio::test]
    async fn should_clamp_limit_when_listing_logs() {
        let logs = Arc::new(StubLogs::default());
        let app = build(AppState::new(DiagnosticsService::new(
            StubTasks(vec![]),
            Arc::clone(&logs),
        )));

        let (status, _) = get_json(app, "/api/task-logs?limit=100000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            logs.queries.lock().unwrap().clone(),
            vec![(None, guildwarden_app::services::diagnostics_service::MAX_LOG_LIMIT)]
        );
    }

    #[tokio::test]
    async fn should_reject_malformed_limit() {
        let app = app();

        let (status, _) = get_json(app, "/api/task-logs?limit=many").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_hide_storage_details_when_store_fails() {
        let app = build(AppState::new(DiagnosticsService::new(
            StubTasks(vec![]),
            FailingLogs,
        )));

        let (status, body) = get_json(app, "/api/task-logs").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }
}
