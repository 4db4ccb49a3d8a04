//! Task module - task records, the task store, and the dispatcher.
//!
//! Lifecycle of a task:
//! - created `processing` by the [`Dispatcher`] once a submission validates
//! - updated only by the one background worker bound to its id
//! - finished exactly once, `completed` (with a result) or `error`
//! - removed by the retention sweep once it is older than the window

mod dispatcher;
mod reporter;
mod store;
mod submission;
#[allow(clippy::module_inception)]
pub mod task;

pub use dispatcher::Dispatcher;
pub use reporter::TaskReporter;
pub use store::{sweep_expired, InMemoryTaskStore, SharedTaskStore, StoreError, TaskStore};
pub use submission::{RawConstraints, SourceInput, Submission};
pub use task::{Task, TaskId, TaskKind, TaskStatus};

/// Errors surfaced synchronously to the submitter or poller.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Missing or malformed request fields. No task was created.
    #[error("{0}")]
    InvalidInput(String),
    #[error("Task not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}
