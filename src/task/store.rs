//! Task storage.
//!
//! The store is injected wherever tasks are read or written so a persistent
//! backend can replace [`InMemoryTaskStore`] without touching the pipelines.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::task::{Task, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The task already reached `completed` or `error`.
    #[error("task {0} has already finished")]
    AlreadyFinished(TaskId),
    #[error("task {0} is not in the store")]
    NotFound(TaskId),
}

/// Concurrent key-value store for task records.
///
/// Implementations must be safe for many writers (one per task) and many
/// readers at once, and must refuse writes to a task in a terminal state.
pub trait TaskStore: Send + Sync {
    fn get(&self, id: &TaskId) -> Option<Task>;

    /// Insert or replace the record keyed by `task.id()`.
    fn set(&self, task: Task) -> Result<(), StoreError>;

    /// Replace an existing record with `change(current)` under one lock.
    /// Never inserts: a missing id fails with [`StoreError::NotFound`].
    fn update(
        &self,
        id: &TaskId,
        change: Box<dyn FnOnce(&Task) -> Task + '_>,
    ) -> Result<(), StoreError>;

    fn delete(&self, id: &TaskId) -> Option<Task>;

    fn list(&self) -> Vec<Task>;

    /// Remove every task last updated before `cutoff`. Returns how many went.
    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> usize;
}

pub type SharedTaskStore = Arc<dyn TaskStore>;

/// Process-memory store. Records live until swept or the process exits.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTaskStore {
        Arc::new(Self::new())
    }
}

// A panicking writer cannot leave a half-written record behind (records are
// replaced whole), so a poisoned lock is still safe to use.
impl TaskStore for InMemoryTaskStore {
    fn get(&self, id: &TaskId) -> Option<Task> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.get(id).cloned()
    }

    fn set(&self, task: Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = tasks.get(&task.id()) {
            if existing.status().is_terminal() {
                return Err(StoreError::AlreadyFinished(task.id()));
            }
        }
        tasks.insert(task.id(), task);
        Ok(())
    }

    fn update(
        &self,
        id: &TaskId,
        change: Box<dyn FnOnce(&Task) -> Task + '_>,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let current = tasks.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        if current.status().is_terminal() {
            return Err(StoreError::AlreadyFinished(*id));
        }
        *current = change(&*current);
        Ok(())
    }

    fn delete(&self, id: &TaskId) -> Option<Task> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        tasks.remove(id)
    }

    fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.values().cloned().collect()
    }

    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, task| task.timestamp() >= cutoff);
        before - tasks.len()
    }
}

/// Drop tasks older than `retention`. Nothing in the core calls this on a
/// schedule; the server runs it from a timer.
pub fn sweep_expired(store: &dyn TaskStore, retention: Duration) -> usize {
    let retention = chrono::Duration::from_std(retention)
        .unwrap_or_else(|_| chrono::Duration::days(36500));
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let removed = store.remove_older_than(cutoff);
    if removed > 0 {
        tracing::info!(removed, "Swept expired tasks");
    }
    removed
}
