//! Shared test helpers for downloader tests

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::DownloadManager;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::library::{FsLibrary, Library};
use crate::models::{
    AlbumData, AlbumRef, AlbumSong, ArtistAlbum, ArtistData, ArtistRef, PlaylistData,
    PlaylistSong, SearchData, SearchSong, SongData,
};
use crate::provider::{AudioStream, Provider, ProviderRegistry};
use crate::types::{Quality, Status, TaskId, TaskInfo, UserId};

/// How a mock download of one song behaves
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Publish metadata, then return these bytes
    Bytes(&'static [u8]),
    /// Return bytes without publishing metadata
    Silent(&'static [u8]),
    /// Publish metadata, then fail with a transport error
    Fail(&'static str),
    /// Publish metadata, then never return
    Hang,
    /// Publish metadata, then return a stream that yields these bytes and stalls
    Stall(&'static [u8]),
}

/// Yields its head, then never completes
struct Stalled(Option<&'static [u8]>);

impl AsyncRead for Stalled {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.0.take() {
            Some(head) => {
                buf.put_slice(head);
                Poll::Ready(Ok(()))
            }
            None => Poll::Pending,
        }
    }
}

/// Decrements the live download counter when dropped
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted in-memory provider registered as "mock"
#[derive(Default)]
pub(crate) struct MockProvider {
    scripts: StdMutex<HashMap<String, Script>>,
    pub(crate) albums: HashMap<String, Vec<&'static str>>,
    pub(crate) artists: HashMap<String, Vec<&'static str>>,
    pub(crate) playlists: HashMap<String, Vec<&'static str>>,
    /// Download calls so far
    pub(crate) downloads: AtomicUsize,
    /// Download calls currently in flight
    pub(crate) live: Arc<AtomicUsize>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script the next downloads of `id` (unscripted songs succeed with b"audio")
    pub(crate) fn script(&self, id: &str, script: Script) {
        self.scripts.lock().unwrap().insert(id.to_string(), script);
    }

    pub(crate) fn with_album(mut self, id: &str, songs: Vec<&'static str>) -> Self {
        self.albums.insert(id.to_string(), songs);
        self
    }

    pub(crate) fn with_artist(mut self, id: &str, albums: Vec<&'static str>) -> Self {
        self.artists.insert(id.to_string(), albums);
        self
    }

    pub(crate) fn with_playlist(mut self, id: &str, songs: Vec<&'static str>) -> Self {
        self.playlists.insert(id.to_string(), songs);
        self
    }

    pub(crate) fn live_downloads(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub(crate) fn song_data(id: &str) -> SongData {
    SongData {
        provider: "tidal".into(),
        api: "mock".into(),
        id: id.to_string(),
        title: format!("Song {}", id),
        track_number: 1,
        audio_quality: Quality::Lossless,
        artists: vec![ArtistRef {
            id: "a1".into(),
            name: "Artist".into(),
        }],
        album: AlbumRef {
            id: "al1".into(),
            title: "Album".into(),
            cover_url: String::new(),
        },
        ..Default::default()
    }
}

fn album_song(id: &str) -> AlbumSong {
    AlbumSong {
        id: id.to_string(),
        title: format!("Song {}", id),
        ..Default::default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn provider(&self) -> &str {
        "tidal"
    }

    async fn song(&self, _: &CancellationToken, _: UserId, id: &str) -> Result<SongData> {
        Ok(song_data(id))
    }

    /// Every scripted song whose title contains `query`
    async fn search(&self, _: &CancellationToken, _: UserId, query: &str) -> Result<SearchData> {
        let mut ids: Vec<String> = self.scripts.lock().unwrap().keys().cloned().collect();
        ids.sort();
        let songs = ids
            .iter()
            .map(|id| song_data(id))
            .filter(|song| song.title.contains(query))
            .map(|song| SearchSong {
                id: song.id,
                title: song.title,
                audio_quality: song.audio_quality,
                artists: song.artists,
                album: song.album,
                ..Default::default()
            })
            .collect();
        Ok(SearchData {
            songs,
            ..Default::default()
        })
    }

    async fn album(&self, _: &CancellationToken, _: UserId, id: &str) -> Result<AlbumData> {
        let songs = self
            .albums
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("album {}", id)))?;
        Ok(AlbumData {
            id: id.to_string(),
            songs: songs.iter().map(|s| album_song(s)).collect(),
            ..Default::default()
        })
    }

    async fn artist(&self, _: &CancellationToken, _: UserId, id: &str) -> Result<ArtistData> {
        let albums = self
            .artists
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("artist {}", id)))?;
        Ok(ArtistData {
            id: id.to_string(),
            albums: albums
                .iter()
                .map(|a| ArtistAlbum {
                    id: a.to_string(),
                    ..Default::default()
                })
                .collect(),
            singles: vec![ArtistAlbum {
                id: "single".into(),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    async fn playlist(&self, _: &CancellationToken, _: UserId, id: &str) -> Result<PlaylistData> {
        let songs = self
            .playlists
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("playlist {}", id)))?;
        Ok(PlaylistData {
            id: id.to_string(),
            songs: songs
                .iter()
                .map(|s| PlaylistSong {
                    id: s.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
    }

    async fn download(
        &self,
        _: &CancellationToken,
        _: UserId,
        id: &str,
        _: Quality,
        progress: mpsc::Sender<SongData>,
    ) -> Result<AudioStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        let _guard = LiveGuard(self.live.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(Script::Bytes(b"audio"));

        if !matches!(script, Script::Silent(_)) {
            let _ = progress.send(song_data(id)).await;
        }

        match script {
            Script::Bytes(bytes) | Script::Silent(bytes) => Ok(AudioStream {
                reader: Box::pin(Cursor::new(bytes)),
                extension: "flac".into(),
            }),
            Script::Stall(head) => Ok(AudioStream {
                reader: Box::pin(Stalled(Some(head))),
                extension: "flac".into(),
            }),
            Script::Fail(message) => Err(Error::transport("http://mock", message)),
            Script::Hang => std::future::pending().await,
        }
    }

    async fn status(&self, _: &CancellationToken, _: &str) -> Result<()> {
        Ok(())
    }

    fn parse_url(&self, url: &str) -> Result<(crate::types::DownloadKind, String)> {
        let (kind, id) = url
            .strip_prefix("mock://")
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| Error::Validation(format!("not a mock link: {}", url)))?;
        Ok((kind.parse()?, id.to_string()))
    }
}

/// A saved track held in memory
#[derive(Clone, Debug)]
pub(crate) struct Saved {
    pub(crate) user: UserId,
    pub(crate) song_id: String,
    pub(crate) bytes: Vec<u8>,
}

/// Library that keeps saved tracks in memory
#[derive(Default)]
pub(crate) struct MemoryLibrary {
    pub(crate) saved: StdMutex<Vec<Saved>>,
}

impl MemoryLibrary {
    pub(crate) fn saved(&self) -> Vec<Saved> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl Library for MemoryLibrary {
    async fn save(
        &self,
        _cancel: &CancellationToken,
        user: UserId,
        mut audio: AudioStream,
        data: &SongData,
    ) -> Result<PathBuf> {
        let mut bytes = Vec::new();
        audio.reader.read_to_end(&mut bytes).await?;
        self.saved.lock().unwrap().push(Saved {
            user,
            song_id: data.id.clone(),
            bytes,
        });
        Ok(PathBuf::from(format!(
            "/memory/{}/{}.{}",
            user, data.id, audio.extension
        )))
    }
}

/// Everything a downloader test needs
pub(crate) struct Harness {
    pub(crate) manager: DownloadManager,
    pub(crate) provider: Arc<MockProvider>,
    pub(crate) library: Arc<MemoryLibrary>,
    _temp_dir: TempDir,
}

/// Create a manager backed by `provider` and an in-memory library
pub(crate) async fn create_test_manager(provider: MockProvider) -> Harness {
    create_test_manager_with(provider, |_| {}).await
}

/// Like [`create_test_manager`], with a hook to adjust the configuration
pub(crate) async fn create_test_manager_with(
    provider: MockProvider,
    configure: impl FnOnce(&mut Config),
) -> Harness {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.download.library_dir = temp_dir.path().join("library");
    config.download.shutdown_timeout = Duration::from_secs(5);
    configure(&mut config);

    let provider = Arc::new(provider);
    let library = Arc::new(MemoryLibrary::default());
    let mut providers = ProviderRegistry::new();
    providers.register(provider.clone());

    let manager = DownloadManager::new(config, providers, library.clone())
        .await
        .unwrap();

    Harness {
        manager,
        provider,
        library,
        _temp_dir: temp_dir,
    }
}

/// A manager writing real files, for tests that inspect the library on disk
pub(crate) struct FsHarness {
    pub(crate) manager: DownloadManager,
    pub(crate) provider: Arc<MockProvider>,
    pub(crate) root: PathBuf,
    _temp_dir: TempDir,
}

/// Create a manager backed by `provider` and an [`FsLibrary`] in a temp dir
pub(crate) async fn create_fs_test_manager(provider: MockProvider) -> FsHarness {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("library");
    let mut config = Config::default();
    config.download.library_dir = root.clone();
    config.download.shutdown_timeout = Duration::from_secs(5);

    let provider = Arc::new(provider);
    let mut providers = ProviderRegistry::new();
    providers.register(provider.clone());
    let manager = DownloadManager::new(config, providers, Arc::new(FsLibrary::new(&root)))
        .await
        .unwrap();

    FsHarness {
        manager,
        provider,
        root,
        _temp_dir: temp_dir,
    }
}

/// Poll until the task reaches `status`, returning its snapshot
pub(crate) async fn wait_for_status(
    manager: &DownloadManager,
    user: UserId,
    id: TaskId,
    status: Status,
) -> TaskInfo {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let task = manager.get(user, id).await.unwrap();
            if task.status == status {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("task {} never reached {}", id, status))
}

/// Poll until `check` holds
pub(crate) async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}
