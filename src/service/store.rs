//! In-memory task table
//!
//! Every status change happens inside one write-locked closure, so readers
//! never observe a half-applied transition.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::protocol::{A2AError, A2ATask, TaskStatus};

#[derive(Debug)]
pub(crate) struct TaskEntry {
    pub(crate) task: A2ATask,
    pub(crate) cancel: CancellationToken,
    /// Set when the task starts running with a handler that can be abandoned
    pub(crate) cancellable: bool,
    finished_at: Option<Instant>,
}

/// Tasks known to a dispatcher, keyed by task id
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    entries: Arc<RwLock<HashMap<String, TaskEntry>>>,
}

impl TaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new task and hand back its cancellation token
    pub(crate) async fn insert(&self, task: A2ATask) -> Result<CancellationToken, A2AError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&task.task_id) {
            return Err(A2AError::DuplicateTask {
                task_id: task.task_id,
            });
        }

        let cancel = CancellationToken::new();
        entries.insert(
            task.task_id.clone(),
            TaskEntry {
                task,
                cancel: cancel.clone(),
                cancellable: false,
                finished_at: None,
            },
        );
        Ok(cancel)
    }

    /// Apply `f` to the entry under the write lock
    pub(crate) async fn update<R>(
        &self,
        task_id: &str,
        f: impl FnOnce(&mut TaskEntry) -> Result<R, A2AError>,
    ) -> Result<R, A2AError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(task_id)
            .ok_or_else(|| A2AError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;

        let result = f(&mut *entry);
        if entry.task.is_terminal() && entry.finished_at.is_none() {
            entry.finished_at = Some(Instant::now());
        }
        result
    }

    /// Snapshot of a task
    pub async fn get(&self, task_id: &str) -> Option<A2ATask> {
        self.entries
            .read()
            .await
            .get(task_id)
            .map(|entry| entry.task.clone())
    }

    /// Remove and return a finished task
    ///
    /// # Errors
    ///
    /// `TaskNotFound` for unknown ids, `TaskInProgress` while the task is not terminal
    pub async fn take(&self, task_id: &str) -> Result<A2ATask, A2AError> {
        let not_found = || A2AError::TaskNotFound {
            task_id: task_id.to_string(),
        };

        let mut entries = self.entries.write().await;
        let finished = entries
            .get(task_id)
            .map(|entry| entry.task.is_terminal())
            .ok_or_else(not_found)?;
        if !finished {
            return Err(A2AError::TaskInProgress {
                task_id: task_id.to_string(),
            });
        }
        entries
            .remove(task_id)
            .map(|entry| entry.task)
            .ok_or_else(not_found)
    }

    /// Snapshots of all tasks, optionally filtered by status, oldest first
    pub async fn list(&self, status: Option<TaskStatus>) -> Vec<A2ATask> {
        let entries = self.entries.read().await;
        let mut tasks: Vec<A2ATask> = entries
            .values()
            .filter(|entry| status.map_or(true, |s| entry.task.status == s))
            .map(|entry| entry.task.clone())
            .collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    /// Drop finished tasks older than `retention`; returns how many were removed
    pub async fn purge_finished_before(&self, retention: Duration) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            entry
                .finished_at
                .map_or(true, |finished| finished.elapsed() < retention)
        });
        before - entries.len()
    }

    /// Number of tracked tasks
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no task is tracked
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
