//! Append-only audit records of scheduled and maintenance work.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{CommunityId, LogEntryId, TaskId};
use crate::time::Timestamp;

/// Final state of a logged run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ok,
    Error,
    Skipped,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown task status {other:?}")),
        }
    }
}

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub id: LogEntryId,
    /// Task kind (`reminder`, `alarm`, …) or maintenance job (`sweep`).
    pub task_ref: String,
    pub task_id: Option<TaskId>,
    pub community: Option<CommunityId>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub status: TaskStatus,
    pub error_detail: Option<String>,
}

impl TaskLogEntry {
    /// Start a record; finish it with [`TaskLogEntry::finish`].
    #[must_use]
    pub fn started(task_ref: impl Into<String>, started_at: Timestamp) -> Self {
        Self {
            id: LogEntryId::new(),
            task_ref: task_ref.into(),
            task_id: None,
            community: None,
            started_at,
            finished_at: started_at,
            status: TaskStatus::Ok,
            error_detail: None,
        }
    }

    #[must_use]
    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    #[must_use]
    pub fn with_community(mut self, community: Option<CommunityId>) -> Self {
        self.community = community;
        self
    }

    #[must_use]
    pub fn finish(mut self, finished_at: Timestamp, status: TaskStatus, error_detail: Option<String>) -> Self {
        self.finished_at = finished_at;
        self.status = status;
        self.error_detail = error_detail;
        self
    }

    #[must_use]
    pub fn duration(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }
}
