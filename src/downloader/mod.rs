//! Download orchestration split into focused submodules.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`add`] - Task creation (songs, albums, artists, playlists, links)
//! - [`control`] - Task control (list, retry, cancel, remove, prune)
//! - [`supervisor`] - Per-task state machine and download attempts
//! - [`lifecycle`] - Shutdown coordination

mod add;
mod control;
mod lifecycle;
mod supervisor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::models::{SearchData, SongData};
use crate::provider::ProviderRegistry;
use crate::types::{Event, Quality, Status, TaskId, TaskInfo, UserId};

/// State a supervisor publishes for its task
#[derive(Clone, Debug)]
pub(crate) struct TaskState {
    pub(crate) status: Status,
    pub(crate) song_data: Option<SongData>,
    pub(crate) error: Option<String>,
}

impl TaskState {
    fn pending() -> Self {
        Self {
            status: Status::Pending,
            song_data: None,
            error: None,
        }
    }
}

/// Signals the registry sends to a supervisor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Control {
    /// Start a new attempt if the last one failed or was cancelled
    Retry,
    /// Abort the current attempt, keeping the task retryable
    Cancel,
}

/// Registry-side handle of a running task
pub(crate) struct TaskHandle {
    /// Latest state published by the supervisor
    pub(crate) state: watch::Receiver<TaskState>,
    /// Never blocks; fails once the supervisor has exited
    pub(crate) control: mpsc::UnboundedSender<Control>,
    /// Cancelling this terminates the supervisor for good
    pub(crate) lifetime: CancellationToken,
    pub(crate) api: String,
    pub(crate) song_id: String,
    pub(crate) quality: Quality,
    pub(crate) created_at: DateTime<Utc>,
}

impl TaskHandle {
    /// Point-in-time copy of the task
    pub(crate) fn snapshot(&self, id: TaskId) -> TaskInfo {
        let state = self.state.borrow().clone();
        TaskInfo {
            id,
            api: self.api.clone(),
            song_id: self.song_id.clone(),
            quality: self.quality,
            status: state.status,
            data: state.song_data,
            error: state.error,
            created_at: self.created_at,
        }
    }

    pub(crate) fn status(&self) -> Status {
        self.state.borrow().status
    }
}

/// Tasks of one user plus the counter their ids are drawn from
#[derive(Default)]
pub(crate) struct UserTasks {
    /// Last id handed out; ids are never reused
    pub(crate) next_id: u64,
    pub(crate) tasks: HashMap<TaskId, TaskHandle>,
}

/// Per-user task registry with one supervisor per task (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadManager {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Provider variants looked up by API name
    pub(crate) providers: Arc<ProviderRegistry>,
    /// Where finished downloads are saved
    pub(crate) library: Arc<dyn Library>,
    /// All tasks, by user; the lock is held only for map edits
    pub(crate) tasks: Arc<Mutex<HashMap<UserId, UserTasks>>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Caps concurrently transferring attempts (max_concurrent_downloads)
    pub(crate) download_limit: Arc<Semaphore>,
    /// Tracks supervisors and their attempts so shutdown can wait for them
    pub(crate) tracker: TaskTracker,
    /// Parent of every task lifetime token
    pub(crate) shutdown: CancellationToken,
    /// Flag to indicate whether new tasks are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl DownloadManager {
    /// Create a new DownloadManager
    ///
    /// Validates the configuration and creates the library directory. No task
    /// is running until one is added.
    pub async fn new(
        config: Config,
        providers: ProviderRegistry,
        library: Arc<dyn Library>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.library_dir)
            .await
            .map_err(|e| {
                crate::Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create library directory '{}': {}",
                        config.download.library_dir.display(),
                        e
                    ),
                ))
            })?;

        // Subscribers that fall more than 1000 events behind get RecvError::Lagged
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            providers = ?providers.names(),
            max_concurrent_downloads = config.download.max_concurrent_downloads,
            "download manager initialized"
        );

        Ok(Self {
            download_limit: Arc::new(Semaphore::new(config.download.max_concurrent_downloads)),
            config: Arc::new(config),
            providers: Arc::new(providers),
            library,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use music_dl::DownloadManager;
    ///
    /// async fn watch(manager: DownloadManager) {
    ///     let mut events = manager.subscribe();
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "download event");
    ///     }
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Registered provider API names
    pub fn providers(&self) -> Vec<String> {
        self.providers.names()
    }

    /// Search a catalogue (e.g. "tidal") through its highest-priority variant that answers
    ///
    /// # Errors
    /// - `Error::Validation` if `query` is blank or no variant serves `provider`
    /// - `Error::Cancelled` if the manager shuts down mid-search
    pub async fn search(&self, user: UserId, provider: &str, query: &str) -> Result<SearchData> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("search query is empty".to_string()));
        }
        let cancel = self.shutdown.child_token();
        self.providers.search(&cancel, user, provider, query).await
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscriber the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
