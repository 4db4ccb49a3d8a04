//! Write handle a background worker uses for its own task.

use super::store::{SharedTaskStore, StoreError};
use super::task::{Task, TaskId};

/// Bound to one task id; the only writer for that task once it is running.
///
/// Writes that fail (task swept, or already finished) are logged and dropped:
/// a worker never aborts because its status line could not be stored.
#[derive(Clone)]
pub struct TaskReporter {
    id: TaskId,
    store: SharedTaskStore,
}

impl TaskReporter {
    pub fn new(id: TaskId, store: SharedTaskStore) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn progress(&self, message: impl Into<String>, progress: u8) {
        self.update(|task| task.with_progress(message, progress));
    }

    pub fn complete(&self, message: impl Into<String>, result: String) {
        self.update(|task| task.completed(message, result));
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.update(|task| task.failed(message));
    }

    fn update(&self, change: impl FnOnce(&Task) -> Task) {
        match self.store.update(&self.id, Box::new(change)) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(task_id = %self.id, "Task vanished from the store, dropping update");
            }
            Err(e) => tracing::warn!(task_id = %self.id, "Dropping task update: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::task::{InMemoryTaskStore, TaskKind, TaskStatus};

    #[test]
    fn test_updates_after_sweep_are_dropped() {
        let store = InMemoryTaskStore::shared();
        let id = TaskId::new();
        store.set(Task::new(id, TaskKind::Story, "Queued")).unwrap();
        let reporter = TaskReporter::new(id, Arc::clone(&store));

        reporter.progress("Drafting", 30);
        assert_eq!(store.get(&id).unwrap().progress(), 30);

        store.delete(&id);
        reporter.progress("Expanding", 60);
        reporter.complete("done", "text".to_string());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_first_terminal_write_wins() {
        let store = InMemoryTaskStore::shared();
        let id = TaskId::new();
        store.set(Task::new(id, TaskKind::Plot, "Queued")).unwrap();
        let reporter = TaskReporter::new(id, Arc::clone(&store));

        reporter.complete("done", "outline".to_string());
        reporter.fail("Error during processing: late");

        let task = store.get(&id).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result(), Some("outline"));
    }
}
