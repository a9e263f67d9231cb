//! Per-task supervisor and download attempts.
//!
//! A supervisor is the only writer of its task's state. It starts attempts,
//! folds their reports into the published [`TaskState`], and reacts to control
//! signals until the task is done or its lifetime token fires.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Semaphore, broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{Control, TaskState};
use crate::error::{Error, Result};
use crate::library::Library;
use crate::models::SongData;
use crate::provider::{AudioStream, Provider};
use crate::types::{Event, Quality, Status, TaskId, UserId};

/// Progress an attempt sends back to its supervisor, in order
#[derive(Debug)]
pub(crate) enum Report {
    /// A download slot was acquired and the transfer began
    Started,
    /// Normalized metadata is known
    Metadata(SongData),
    /// Last report of an attempt
    Finished(Result<PathBuf>),
}

/// What one attempt needs to download and save a song
#[derive(Clone)]
pub(crate) struct Job {
    pub(crate) user: UserId,
    pub(crate) id: TaskId,
    pub(crate) song_id: String,
    pub(crate) quality: Quality,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) library: Arc<dyn Library>,
    pub(crate) download_limit: Arc<Semaphore>,
}

pub(crate) struct Supervisor {
    pub(crate) job: Job,
    pub(crate) tracker: TaskTracker,
    pub(crate) events: broadcast::Sender<Event>,
    pub(crate) state: watch::Sender<TaskState>,
}

impl Supervisor {
    /// Drive the task until it is done or `lifetime` fires
    pub(crate) async fn run(
        self,
        lifetime: CancellationToken,
        mut control: mpsc::UnboundedReceiver<Control>,
    ) {
        let (report_tx, mut reports) = mpsc::unbounded_channel();
        let mut attempt = Some(self.start_attempt(&lifetime, &report_tx));

        loop {
            tokio::select! {
                biased;
                _ = lifetime.cancelled() => {
                    if let Some(token) = attempt.take() {
                        token.cancel();
                        // The attempt always ends with Finished; wait for it to unwind
                        while let Some(report) = reports.recv().await {
                            if matches!(report, Report::Finished(_)) {
                                break;
                            }
                        }
                        self.publish(Status::Cancelled, None);
                    }
                    debug!(user_id = self.job.user.0, task_id = self.job.id.0, "supervisor stopped");
                    return;
                }
                Some(report) = reports.recv() => match report {
                    Report::Started => self.publish(Status::Running, None),
                    Report::Metadata(data) => self.store_metadata(data),
                    Report::Finished(outcome) => {
                        attempt = None;
                        if self.finish(outcome) == Status::Done {
                            debug!(user_id = self.job.user.0, task_id = self.job.id.0, "supervisor finished");
                            return;
                        }
                    }
                },
                signal = control.recv() => match signal {
                    Some(Control::Retry) => {
                        let status = self.state.borrow().status;
                        if attempt.is_none() && status.is_retryable() {
                            info!(user_id = self.job.user.0, task_id = self.job.id.0, "retrying download");
                            self.publish(Status::Pending, None);
                            attempt = Some(self.start_attempt(&lifetime, &report_tx));
                        } else {
                            debug!(task_id = self.job.id.0, %status, "ignoring retry");
                        }
                    }
                    Some(Control::Cancel) => {
                        if let Some(token) = &attempt {
                            debug!(task_id = self.job.id.0, "cancelling attempt");
                            token.cancel();
                        }
                    }
                    // Registry dropped the handle
                    None => lifetime.cancel(),
                },
            }
        }
    }

    /// Spawn a fresh attempt scoped to a child of `lifetime`
    fn start_attempt(
        &self,
        lifetime: &CancellationToken,
        reports: &mpsc::UnboundedSender<Report>,
    ) -> CancellationToken {
        let token = lifetime.child_token();
        let cancel = token.clone();
        let job = self.job.clone();
        let reports = reports.clone();

        self.tracker.spawn(async move {
            let outcome = job.transfer(&cancel, &reports).await;
            let _ = reports.send(Report::Finished(outcome));
        });

        token
    }

    /// Record the outcome of an attempt and return the resulting status
    fn finish(&self, outcome: Result<PathBuf>) -> Status {
        let (status, error) = match outcome {
            Ok(path) => {
                info!(
                    user_id = self.job.user.0,
                    task_id = self.job.id.0,
                    song_id = %self.job.song_id,
                    path = %path.display(),
                    "download complete"
                );
                (Status::Done, None)
            }
            Err(e) if e.is_cancelled() => {
                info!(user_id = self.job.user.0, task_id = self.job.id.0, "download cancelled");
                (Status::Cancelled, None)
            }
            Err(e) => {
                warn!(
                    user_id = self.job.user.0,
                    task_id = self.job.id.0,
                    song_id = %self.job.song_id,
                    error = %e,
                    "download failed"
                );
                (Status::Failed, Some(e.to_string()))
            }
        };
        self.publish(status, error);
        status
    }

    fn publish(&self, status: Status, error: Option<String>) {
        self.state.send_modify(|state| {
            state.status = status;
            state.error = error;
        });
        self.events
            .send(Event::StatusChanged {
                user: self.job.user,
                id: self.job.id,
                status,
            })
            .ok();
    }

    fn store_metadata(&self, data: SongData) {
        self.state.send_modify(|state| state.song_data = Some(data));
        self.events
            .send(Event::MetadataUpdated {
                user: self.job.user,
                id: self.job.id,
            })
            .ok();
    }
}

impl Job {
    /// Wait for a download slot, open the stream and hand it to the library
    ///
    /// Waiting and opening are abandoned as soon as `cancel` fires. The save is
    /// not: the library observes `cancel` itself and cleans up what it wrote.
    async fn transfer(
        &self,
        cancel: &CancellationToken,
        reports: &mpsc::UnboundedSender<Report>,
    ) -> Result<PathBuf> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.download_limit.acquire() => permit.map_err(|_| Error::ShuttingDown)?,
        };
        let _ = reports.send(Report::Started);

        let (audio, data) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = self.open(cancel, reports) => res?,
        };

        self.library.save(cancel, self.user, audio, &data).await
    }

    /// Open the audio stream and settle on the metadata it will be saved with
    async fn open(
        &self,
        cancel: &CancellationToken,
        reports: &mpsc::UnboundedSender<Report>,
    ) -> Result<(AudioStream, SongData)> {
        let (progress_tx, mut progress_rx) = mpsc::channel(4);
        let mut download = self.provider.download(
            cancel,
            self.user,
            &self.song_id,
            self.quality,
            progress_tx,
        );

        let mut latest = None;
        let audio = loop {
            tokio::select! {
                res = &mut download => break res?,
                Some(data) = progress_rx.recv() => {
                    let _ = reports.send(Report::Metadata(data.clone()));
                    latest = Some(data);
                }
            }
        };
        while let Ok(data) = progress_rx.try_recv() {
            let _ = reports.send(Report::Metadata(data.clone()));
            latest = Some(data);
        }

        let data = match latest {
            Some(data) => data,
            None => {
                let data = self.provider.song(cancel, self.user, &self.song_id).await?;
                let _ = reports.send(Report::Metadata(data.clone()));
                data
            }
        };
        Ok((audio, data))
    }
}
