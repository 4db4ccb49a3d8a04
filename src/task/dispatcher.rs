//! Task dispatcher: validate, record, schedule, return.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;

use crate::llm::GenerationClient;
use crate::pipeline::{self, GenerationRequest};

use super::reporter::TaskReporter;
use super::store::SharedTaskStore;
use super::submission::Submission;
use super::task::{Task, TaskId};
use super::TaskError;

const QUEUED_MESSAGE: &str = "Waiting for a free worker...";

/// Accepts submissions and runs each one as its own background task.
///
/// At most `max_concurrent` pipelines hold a worker permit at once; the rest
/// wait in `processing` with a queued message.
#[derive(Clone)]
pub struct Dispatcher {
    store: SharedTaskStore,
    client: Arc<dyn GenerationClient>,
    workers: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        store: SharedTaskStore,
        client: Arc<dyn GenerationClient>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            client,
            workers: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn store(&self) -> &SharedTaskStore {
        &self.store
    }

    /// Validate and schedule a submission. Returns as soon as the task is
    /// recorded; never waits on the pipeline. Must be called from within a
    /// Tokio runtime.
    pub fn submit(&self, submission: Submission) -> Result<TaskId, TaskError> {
        let request = submission.validate()?;
        let id = TaskId::new();
        self.store
            .set(Task::new(id, request.kind(), QUEUED_MESSAGE))?;

        tracing::info!(task_id = %id, kind = ?request.kind(), "Task submitted");

        let reporter = TaskReporter::new(id, Arc::clone(&self.store));
        let client = Arc::clone(&self.client);
        let workers = Arc::clone(&self.workers);

        tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    reporter.fail("Error during processing: worker pool is shut down");
                    return;
                }
            };
            run_task(client, reporter, request).await;
        });

        Ok(id)
    }
}

/// Run one pipeline to a terminal state. Every failure, panics included,
/// ends as an `error` record rather than escaping the worker.
async fn run_task(
    client: Arc<dyn GenerationClient>,
    reporter: TaskReporter,
    request: GenerationRequest,
) {
    let id = reporter.id();
    let outcome = AssertUnwindSafe(pipeline::run(&request, client.as_ref(), &reporter))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(done)) => {
            tracing::info!(task_id = %id, chars = done.text.chars().count(), "Task completed");
            reporter.complete(done.message, done.text);
        }
        Ok(Err(e)) => {
            tracing::error!(task_id = %id, "Task failed: {:#}", e);
            reporter.fail(format!("Error during processing: {}", e));
        }
        Err(_) => {
            tracing::error!(task_id = %id, "Task worker panicked");
            reporter.fail("Error during processing: internal error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::llm::testing::{GatedClient, PanickingClient, ScriptedClient};
    use crate::llm::LlmError;
    use crate::task::{InMemoryTaskStore, RawConstraints, SourceInput, TaskKind, TaskStatus};

    fn plot_submission() -> Submission {
        Submission {
            kind: TaskKind::Plot,
            source: SourceInput::Text("A chef loses her restaurant".to_string()),
            constraints: RawConstraints {
                paragraph_count: Some("4".to_string()),
                progressions_per_paragraph: Some("3".to_string()),
                ..Default::default()
            },
        }
    }

    async fn wait_for_terminal(store: &SharedTaskStore, id: TaskId) -> Task {
        for _ in 0..200 {
            let task = store.get(&id).expect("task exists");
            if task.status().is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {id} never finished");
    }

    #[tokio::test]
    async fn test_submit_returns_before_generation_finishes() {
        let store = InMemoryTaskStore::shared();
        let client = Arc::new(GatedClient::new("**Paragraph 1**"));
        let dispatcher = Dispatcher::new(Arc::clone(&store), client.clone(), 2);

        let id = tokio::time::timeout(
            Duration::from_millis(100),
            async { dispatcher.submit(plot_submission()) },
        )
        .await
        .expect("submit must not block")
        .unwrap();

        let task = store.get(&id).unwrap();
        assert_eq!(task.status(), TaskStatus::Processing);
        assert!(task.result().is_none());

        client.open();
        let task = wait_for_terminal(&store, id).await;
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result(), Some("**Paragraph 1**"));
    }

    #[tokio::test]
    async fn test_generation_error_marks_task_failed() {
        let store = InMemoryTaskStore::shared();
        let client = Arc::new(
            ScriptedClient::new().fail(LlmError::server_error(500, "upstream down".to_string())),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&store), client, 1);

        let id = dispatcher.submit(plot_submission()).unwrap();
        let task = wait_for_terminal(&store, id).await;

        assert_eq!(task.status(), TaskStatus::Error);
        assert!(task.result().is_none());
        assert!(task.message().starts_with("Error during processing:"));
        assert!(task.message().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_panicking_pipeline_marks_task_failed() {
        let store = InMemoryTaskStore::shared();
        let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::new(PanickingClient), 1);

        let id = dispatcher.submit(plot_submission()).unwrap();
        let task = wait_for_terminal(&store, id).await;

        assert_eq!(task.status(), TaskStatus::Error);
        assert!(task.result().is_none());
        assert_eq!(task.message(), "Error during processing: internal error");

        // The worker permit was released; the pool still accepts work.
        let next = dispatcher.submit(plot_submission()).unwrap();
        assert_eq!(wait_for_terminal(&store, next).await.status(), TaskStatus::Error);
    }

    #[tokio::test]
    async fn test_invalid_submission_creates_no_task() {
        let store = InMemoryTaskStore::shared();
        let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::new(ScriptedClient::new()), 1);

        let mut bad = plot_submission();
        bad.constraints.paragraph_count = Some("zero".to_string());
        assert!(matches!(
            dispatcher.submit(bad),
            Err(TaskError::InvalidInput(_))
        ));
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn test_worker_limit_queues_extra_tasks() {
        let store = InMemoryTaskStore::shared();
        let client = Arc::new(GatedClient::new("done"));
        let dispatcher = Dispatcher::new(Arc::clone(&store), client.clone(), 1);

        let first = dispatcher.submit(plot_submission()).unwrap();
        let second = dispatcher.submit(plot_submission()).unwrap();

        // Let the first worker take the only permit and start generating.
        for _ in 0..50 {
            if store.get(&first).unwrap().message() != QUEUED_MESSAGE {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_ne!(store.get(&first).unwrap().message(), QUEUED_MESSAGE);
        assert_eq!(store.get(&second).unwrap().message(), QUEUED_MESSAGE);

        client.open();
        assert_eq!(wait_for_terminal(&store, first).await.status(), TaskStatus::Completed);
        assert_eq!(wait_for_terminal(&store, second).await.status(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminal_status_is_stable_across_polls() {
        let store = InMemoryTaskStore::shared();
        let client = Arc::new(ScriptedClient::new().respond("outline"));
        let dispatcher = Dispatcher::new(Arc::clone(&store), client, 1);

        let id = dispatcher.submit(plot_submission()).unwrap();
        let first = wait_for_terminal(&store, id).await;
        for _ in 0..5 {
            assert_eq!(store.get(&id).unwrap(), first);
        }
    }
}
