//! Task creation: songs, and the collections that expand into songs.

use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::supervisor::{Job, Supervisor};
use super::{DownloadManager, TaskHandle, TaskState};
use crate::error::{Error, Result};
use crate::types::{DownloadKind, DownloadRequest, Event, Quality, TaskId, UserId};

impl DownloadManager {
    /// Queue a single song
    ///
    /// Allocates the next task id for `user`, registers the task as Pending and
    /// starts its supervisor. Never waits on the network.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `api` is not a registered provider
    /// - `Error::ShuttingDown` once `shutdown()` has started
    pub async fn add_song(
        &self,
        user: UserId,
        api: &str,
        song_id: &str,
        quality: Option<Quality>,
    ) -> Result<TaskId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let provider = self.providers.get(api)?;
        let quality = quality.unwrap_or(self.config.download.default_quality);

        let (state_tx, state_rx) = watch::channel(TaskState::pending());
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let lifetime = self.shutdown.child_token();

        let id = {
            let mut tasks = self.tasks.lock().await;
            let user_tasks = tasks.entry(user).or_default();
            user_tasks.next_id += 1;
            let id = TaskId(user_tasks.next_id);
            user_tasks.tasks.insert(
                id,
                TaskHandle {
                    state: state_rx,
                    control: control_tx,
                    lifetime: lifetime.clone(),
                    api: api.to_string(),
                    song_id: song_id.to_string(),
                    quality,
                    created_at: Utc::now(),
                },
            );
            id
        };

        let supervisor = Supervisor {
            job: Job {
                user,
                id,
                song_id: song_id.to_string(),
                quality,
                provider,
                library: self.library.clone(),
                download_limit: self.download_limit.clone(),
            },
            tracker: self.tracker.clone(),
            events: self.event_tx.clone(),
            state: state_tx,
        };
        self.tracker.spawn(supervisor.run(lifetime, control_rx));

        info!(user_id = user.0, task_id = id.0, api, song_id, quality = ?quality, "song queued");
        self.emit_event(Event::TaskQueued { user, id });
        Ok(id)
    }

    /// Queue every track of an album
    ///
    /// Resolves the track listing first. A track that cannot be queued is
    /// logged and skipped without affecting its siblings.
    pub async fn add_album(
        &self,
        user: UserId,
        api: &str,
        album_id: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<TaskId>> {
        let provider = self.providers.get(api)?;
        let cancel = self.shutdown.child_token();
        let album = provider.album(&cancel, user, album_id).await?;

        let mut ids = Vec::with_capacity(album.songs.len());
        for song in &album.songs {
            match self.add_song(user, api, &song.id, quality).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(user_id = user.0, album_id, song_id = %song.id, error = %e, "skipping album track")
                }
            }
        }

        info!(user_id = user.0, album_id, queued = ids.len(), "album queued");
        Ok(ids)
    }

    /// Queue every album of an artist
    ///
    /// EPs and singles are not included. An album whose listing cannot be
    /// resolved is logged and skipped.
    pub async fn add_artist(
        &self,
        user: UserId,
        api: &str,
        artist_id: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<TaskId>> {
        let provider = self.providers.get(api)?;
        let cancel = self.shutdown.child_token();
        let artist = provider.artist(&cancel, user, artist_id).await?;

        let mut ids = Vec::new();
        for album in &artist.albums {
            match self.add_album(user, api, &album.id, quality).await {
                Ok(queued) => ids.extend(queued),
                Err(e) => {
                    warn!(user_id = user.0, artist_id, album_id = %album.id, error = %e, "skipping artist album")
                }
            }
        }

        info!(user_id = user.0, artist_id, queued = ids.len(), "artist queued");
        Ok(ids)
    }

    /// Queue every track of a playlist
    pub async fn add_playlist(
        &self,
        user: UserId,
        api: &str,
        playlist_id: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<TaskId>> {
        let provider = self.providers.get(api)?;
        let cancel = self.shutdown.child_token();
        let playlist = provider.playlist(&cancel, user, playlist_id).await?;

        let mut ids = Vec::with_capacity(playlist.songs.len());
        for song in &playlist.songs {
            match self.add_song(user, api, &song.id, quality).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(user_id = user.0, playlist_id, song_id = %song.id, error = %e, "skipping playlist track")
                }
            }
        }

        info!(user_id = user.0, playlist_id, queued = ids.len(), "playlist queued");
        Ok(ids)
    }

    /// Queue whatever a [`DownloadRequest`] points at
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an unknown provider, type or quality.
    pub async fn add(&self, user: UserId, request: &DownloadRequest) -> Result<Vec<TaskId>> {
        let kind: DownloadKind = request.kind.parse()?;
        let quality = request
            .quality
            .as_deref()
            .map(str::parse::<Quality>)
            .transpose()?;
        self.add_kind(user, &request.api, kind, &request.id, quality)
            .await
    }

    /// Queue the song, album, artist or playlist behind a public catalogue link
    pub async fn add_url(
        &self,
        user: UserId,
        api: &str,
        url: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<TaskId>> {
        let (kind, id) = self.providers.get(api)?.parse_url(url)?;
        self.add_kind(user, api, kind, &id, quality).await
    }

    async fn add_kind(
        &self,
        user: UserId,
        api: &str,
        kind: DownloadKind,
        id: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<TaskId>> {
        match kind {
            DownloadKind::Song => Ok(vec![self.add_song(user, api, id, quality).await?]),
            DownloadKind::Album => self.add_album(user, api, id, quality).await,
            DownloadKind::Artist => self.add_artist(user, api, id, quality).await,
            DownloadKind::Playlist => self.add_playlist(user, api, id, quality).await,
        }
    }
}
