//! Task control: listing, retry, cancel, removal and pruning.
//!
//! The registry lock is only held to look up or edit the map. Signals to
//! supervisors go out after it has been released.

use crate::error::{DownloadError, Result};
use crate::types::{Event, Status, TaskId, TaskInfo, UserId};

use super::{Control, DownloadManager};

impl DownloadManager {
    /// Snapshot of all tasks of a user, ordered by task id
    ///
    /// The returned records are copies; they do not follow later changes.
    pub async fn list(&self, user: UserId) -> Vec<TaskInfo> {
        let tasks = self.tasks.lock().await;
        let mut list: Vec<TaskInfo> = tasks
            .get(&user)
            .map(|user_tasks| {
                user_tasks
                    .tasks
                    .iter()
                    .map(|(id, handle)| handle.snapshot(*id))
                    .collect()
            })
            .unwrap_or_default();
        drop(tasks);

        list.sort_by_key(|task| task.id);
        list
    }

    /// Snapshot of a single task
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::NotFound` if the user has no such task
    pub async fn get(&self, user: UserId, id: TaskId) -> Result<TaskInfo> {
        let tasks = self.tasks.lock().await;
        tasks
            .get(&user)
            .and_then(|user_tasks| user_tasks.tasks.get(&id))
            .map(|handle| handle.snapshot(id))
            .ok_or_else(|| DownloadError::NotFound { user, id }.into())
    }

    /// Start a new attempt for a failed or cancelled task
    ///
    /// # Errors
    ///
    /// - `DownloadError::NotFound` if the user has no such task
    /// - `DownloadError::InvalidState` if the task is Pending, Running or Done
    /// - `DownloadError::Terminated` if the task's supervisor is gone (after shutdown)
    pub async fn retry(&self, user: UserId, id: TaskId) -> Result<()> {
        let control = {
            let tasks = self.tasks.lock().await;
            let handle = tasks
                .get(&user)
                .and_then(|user_tasks| user_tasks.tasks.get(&id))
                .ok_or(DownloadError::NotFound { user, id })?;

            let status = handle.status();
            if !status.is_retryable() {
                return Err(DownloadError::InvalidState {
                    id,
                    operation: "retry".to_string(),
                    current_state: status.to_string(),
                }
                .into());
            }
            handle.control.clone()
        };

        control
            .send(Control::Retry)
            .map_err(|_| DownloadError::Terminated { id })?;

        tracing::debug!(user_id = user.0, task_id = id.0, "retry requested");
        Ok(())
    }

    /// Retry every failed or cancelled task of a user
    ///
    /// Returns the ids that were signalled.
    pub async fn retry_all(&self, user: UserId) -> Vec<TaskId> {
        let targets: Vec<_> = {
            let tasks = self.tasks.lock().await;
            tasks
                .get(&user)
                .map(|user_tasks| {
                    user_tasks
                        .tasks
                        .iter()
                        .filter(|(_, handle)| handle.status().is_retryable())
                        .map(|(id, handle)| (*id, handle.control.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut retried: Vec<TaskId> = targets
            .into_iter()
            .filter_map(|(id, control)| control.send(Control::Retry).ok().map(|()| id))
            .collect();
        retried.sort();

        tracing::info!(user_id = user.0, count = retried.len(), "retrying failed downloads");
        retried
    }

    /// Abort the running attempt of a task
    ///
    /// The task ends up Cancelled and can be retried. Cancelling a task that
    /// is already Done, Failed or Cancelled does nothing.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::NotFound` if the user has no such task
    pub async fn cancel(&self, user: UserId, id: TaskId) -> Result<()> {
        let (status, control) = {
            let tasks = self.tasks.lock().await;
            let handle = tasks
                .get(&user)
                .and_then(|user_tasks| user_tasks.tasks.get(&id))
                .ok_or(DownloadError::NotFound { user, id })?;
            (handle.status(), handle.control.clone())
        };

        if status.is_terminal() {
            tracing::debug!(task_id = id.0, %status, "cancel on finished task ignored");
            return Ok(());
        }

        // A supervisor that already exited has nothing left to cancel
        if control.send(Control::Cancel).is_err() {
            tracing::debug!(task_id = id.0, "cancel on unsupervised task ignored");
        }
        Ok(())
    }

    /// Terminate a task's supervisor and evict the task, whatever its state
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::NotFound` if the user has no such task
    pub async fn remove(&self, user: UserId, id: TaskId) -> Result<()> {
        let handle = {
            let mut tasks = self.tasks.lock().await;
            tasks
                .get_mut(&user)
                .and_then(|user_tasks| user_tasks.tasks.remove(&id))
                .ok_or(DownloadError::NotFound { user, id })?
        };

        handle.lifetime.cancel();

        tracing::info!(user_id = user.0, task_id = id.0, "download removed");
        self.emit_event(Event::TaskRemoved { user, id });
        Ok(())
    }

    /// Evict every Done or Cancelled task of a user
    ///
    /// Returns the ids that were evicted.
    pub async fn done(&self, user: UserId) -> Vec<TaskId> {
        let evicted: Vec<_> = {
            let mut tasks = self.tasks.lock().await;
            match tasks.get_mut(&user) {
                Some(user_tasks) => {
                    let ids: Vec<TaskId> = user_tasks
                        .tasks
                        .iter()
                        .filter(|(_, handle)| {
                            matches!(handle.status(), Status::Done | Status::Cancelled)
                        })
                        .map(|(id, _)| *id)
                        .collect();
                    ids.into_iter()
                        .filter_map(|id| user_tasks.tasks.remove(&id).map(|handle| (id, handle)))
                        .collect()
                }
                None => Vec::new(),
            }
        };

        let mut ids = Vec::with_capacity(evicted.len());
        for (id, handle) in evicted {
            handle.lifetime.cancel();
            self.emit_event(Event::TaskRemoved { user, id });
            ids.push(id);
        }
        ids.sort();

        tracing::info!(user_id = user.0, count = ids.len(), "pruned finished downloads");
        ids
    }
}
