//! Common test utilities for music-dl end-to-end tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use std::time::Duration;

use music_dl::{DownloadManager, Status, TaskId, TaskInfo, UserId};

/// Poll until a task reaches `status`, panicking after `timeout`
#[allow(dead_code)]
pub async fn wait_for_status(
    manager: &DownloadManager,
    user: UserId,
    id: TaskId,
    status: Status,
    timeout: Duration,
) -> TaskInfo {
    let poll = async {
        loop {
            let task = manager.get(user, id).await.unwrap();
            if task.status == status {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    match tokio::time::timeout(timeout, poll).await {
        Ok(task) => task,
        Err(_) => {
            let task = manager.get(user, id).await.unwrap();
            panic!(
                "task {} stuck in {} (error: {:?}), expected {}",
                id, task.status, task.error, status
            )
        }
    }
}
