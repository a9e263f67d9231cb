//! User music libraries
//!
//! The supervisor hands every finished stream to a [`Library`]. The default
//! [`FsLibrary`] files tracks under `<root>/<user>/<artist>/<album>/` and can
//! embed tags on the way.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::ByteReader;
use crate::models::SongData;
use crate::provider::AudioStream;
use crate::tagging::Tagger;
use crate::types::UserId;

/// Destination for downloaded audio
#[async_trait]
pub trait Library: Send + Sync {
    /// Persist `audio` for `user`, returning where it ended up
    ///
    /// Must stop promptly and leave nothing behind when `cancel` fires.
    async fn save(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        audio: AudioStream,
        data: &SongData,
    ) -> Result<PathBuf>;
}

/// Library writing plain files below a root directory
///
/// With a [`Tagger`] attached, every saved track gets its tags and cover
/// embedded before it is moved into place.
#[derive(Clone, Debug)]
pub struct FsLibrary {
    root: PathBuf,
    tagger: Option<Tagger>,
}

impl FsLibrary {
    /// Create a library rooted at `root` (created lazily on first save)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tagger: None,
        }
    }

    /// Library at `download.library_dir`, tagging when `config` allows it
    pub fn from_config(config: &Config) -> Result<Self> {
        let library = Self::new(&config.download.library_dir);
        Ok(match Tagger::from_config(config)? {
            Some(tagger) => library.with_tagger(tagger),
            None => library,
        })
    }

    /// Embed tags with `tagger` before a track is moved into place
    pub fn with_tagger(mut self, tagger: Tagger) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Library root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of a track with the given extension
    pub fn track_path(&self, user: UserId, data: &SongData, extension: &str) -> PathBuf {
        let artist = data
            .artists
            .first()
            .map(|a| a.name.as_str())
            .unwrap_or_default();
        let file = format!(
            "{:02} - {}.{}",
            data.track_number,
            path_component(&data.title, "Unknown Title"),
            extension
        );

        self.root
            .join(user.to_string())
            .join(path_component(artist, "Unknown Artist"))
            .join(path_component(&data.album.title, "Unknown Album"))
            .join(file)
    }
}

#[async_trait]
impl Library for FsLibrary {
    async fn save(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        mut audio: AudioStream,
        data: &SongData,
    ) -> Result<PathBuf> {
        let target = self.track_path(user, data, &audio.extension);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(".part");
        // Removed on every early return, and when this future is dropped mid-write
        let partial = Scratch::new(PathBuf::from(partial));

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = write_stream(partial.path(), &mut audio.reader) => res,
        }?;

        if let Some(tagger) = &self.tagger {
            match tagger
                .embed(cancel, partial.path(), &audio.extension, data)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!(
                    user_id = user.0,
                    song_id = %data.id,
                    error = %e,
                    "tag embedding failed, keeping untagged audio"
                ),
            }
        }

        fs::rename(partial.path(), &target).await?;
        partial.keep();

        info!(
            user_id = user.0,
            song_id = %data.id,
            path = %target.display(),
            bytes = written,
            "track saved"
        );
        Ok(target)
    }
}

async fn write_stream(path: &Path, reader: &mut ByteReader) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let written = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

/// Scratch file removed when dropped, unless kept
#[derive(Debug)]
pub(crate) struct Scratch {
    path: PathBuf,
    keep: bool,
}

impl Scratch {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// The file was moved or is wanted; leave it alone
    pub(crate) fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

/// Make a catalogue name safe to use as a single path component
fn path_component(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" => fallback.to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}
