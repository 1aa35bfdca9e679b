//! Shared application state for axum handlers.

use std::sync::Arc;

use guildwarden_app::ports::{TaskLogStore, TaskRepository};
use guildwarden_app::services::DiagnosticsService;

/// Application state shared across all axum handlers.
///
/// Generic over the task repository and task log store to avoid dynamic
/// dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone`; only the `Arc` is cloned.
pub struct AppState<T, L> {
    pub diagnostics: Arc<DiagnosticsService<T, L>>,
}

impl<T, L> Clone for AppState<T, L> {
    fn clone(&self) -> Self {
        Self {
            diagnostics: Arc::clone(&self.diagnostics),
        }
    }
}

impl<T, L> AppState<T, L>
where
    T: TaskRepository + Send + Sync + 'static,
    L: TaskLogStore + Send + Sync + 'static,
{
    pub fn new(diagnostics: DiagnosticsService<T, L>) -> Self {
        Self::from_arc(Arc::new(diagnostics))
    }

    /// Use this when the service is shared with other components.
    pub fn from_arc(diagnostics: Arc<DiagnosticsService<T, L>>) -> Self {
        Self { diagnostics }
    }
}
