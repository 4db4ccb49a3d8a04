//! Task record and its identifiers.
//!
//! Status and result are only reachable through the transition methods so a
//! record can never carry a result unless it is `completed`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TaskId)
    }
}

/// Which pipeline a task runs, and how its result is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ScriptRewrite,
    Story,
    Plot,
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "script_rewrite" => Ok(TaskKind::ScriptRewrite),
            "story" => Ok(TaskKind::Story),
            "plot" => Ok(TaskKind::Plot),
            other => Err(format!("Unknown task kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

/// One user-submitted generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    status: TaskStatus,
    message: String,
    progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Task {
    /// A freshly submitted task: `processing`, 0% progress.
    pub fn new(id: TaskId, kind: TaskKind, message: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Processing,
            message: message.into(),
            progress: 0,
            result: None,
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Final text; `Some` only for completed tasks.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Same task, still processing, with a new step description.
    pub fn with_progress(&self, message: impl Into<String>, progress: u8) -> Self {
        Self {
            message: message.into(),
            progress: progress.min(100),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    pub fn completed(&self, message: impl Into<String>, result: String) -> Self {
        Self {
            status: TaskStatus::Completed,
            message: message.into(),
            progress: 100,
            result: Some(result),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    pub fn failed(&self, message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            message: message.into(),
            progress: 0,
            result: None,
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub(crate) fn backdated(mut self, by: chrono::Duration) -> Self {
        self.timestamp = self.timestamp - by;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_only_on_completion() {
        let task = Task::new(TaskId::new(), TaskKind::Story, "Queued");
        assert_eq!(task.status(), TaskStatus::Processing);
        assert!(task.result().is_none());

        let step = task.with_progress("Step 1/2", 30);
        assert_eq!(step.progress(), 30);
        assert!(step.result().is_none());

        let done = step.completed("done", "text".to_string());
        assert_eq!(done.status(), TaskStatus::Completed);
        assert_eq!(done.result(), Some("text"));
        assert_eq!(done.progress(), 100);
        assert_eq!(done.id(), task.id());

        let failed = step.failed("Error during processing: boom");
        assert_eq!(failed.status(), TaskStatus::Error);
        assert!(failed.result().is_none());
    }

    #[test]
    fn test_status_json_shape() {
        let task = Task::new(TaskId::new(), TaskKind::ScriptRewrite, "Queued");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["kind"], "script_rewrite");
        assert_eq!(json["progress"], 0);
        assert!(json.get("result").is_none());

        let json = serde_json::to_value(task.completed("ok", "final".into())).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"], "final");
    }

    #[test]
    fn test_parse_ids_and_kinds() {
        let id = TaskId::new();
        assert_eq!(id.to_string().parse::<TaskId>().unwrap(), id);
        assert!("not-a-uuid".parse::<TaskId>().is_err());
        assert_eq!("plot".parse::<TaskKind>().unwrap(), TaskKind::Plot);
        assert!("poem".parse::<TaskKind>().is_err());
    }
}
