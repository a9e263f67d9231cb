//! Tag and cover embedding
//!
//! Saved tracks get their catalogue metadata written into the container by
//! ffmpeg, with the album cover attached when it can be fetched. The audio
//! stream itself is copied, never re-encoded.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::library::Scratch;
use crate::models::SongData;

/// Writes tags and cover art into saved audio files
#[derive(Clone, Debug)]
pub struct Tagger {
    ffmpeg: PathBuf,
    covers: Option<Fetcher>,
}

impl Tagger {
    /// Tag through the ffmpeg binary at `ffmpeg`, without cover art
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            covers: None,
        }
    }

    /// Download album covers through `fetcher` and attach them
    pub fn with_covers(mut self, fetcher: Fetcher) -> Self {
        self.covers = Some(fetcher);
        self
    }

    /// Tagger for `config`, or `None` when tagging is disabled or ffmpeg is missing
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        if !config.download.embed_tags {
            return Ok(None);
        }
        match config.tools.resolve_ffmpeg() {
            Some(ffmpeg) => {
                let fetcher = Fetcher::new(&config.resolver)?;
                Ok(Some(Self::new(ffmpeg).with_covers(fetcher)))
            }
            None => {
                warn!("ffmpeg not found, tracks will be saved without tags");
                Ok(None)
            }
        }
    }

    /// Rewrite `file` in place with `data` as its tags
    ///
    /// `extension` names the container, since `file` may carry a scratch suffix.
    /// A cover that cannot be fetched is skipped and the tags are still written.
    ///
    /// # Errors
    /// - `Error::Cancelled` if `cancel` fires; `file` is left as it was
    /// - `Error::ExternalTool` if ffmpeg cannot be started or fails
    pub async fn embed(
        &self,
        cancel: &CancellationToken,
        file: &Path,
        extension: &str,
        data: &SongData,
    ) -> Result<()> {
        let cover = match self.fetch_cover(cancel, file, data).await {
            Ok(cover) => cover,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(song_id = %data.id, error = %e, "cover unavailable, tagging without it");
                None
            }
        };

        let output = Scratch::new(suffixed(file, &format!("tagged.{}", extension)));
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(file);
        if let Some(cover) = &cover {
            command.arg("-i").arg(cover.path());
        }
        command.args(["-map", "0:a"]);
        if cover.is_some() {
            command.args(["-map", "1:v", "-disposition:v:0", "attached_pic"]);
        }
        command
            .args(["-c", "copy", "-map_metadata", "-1"])
            .args(metadata_args(data))
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = command.output() => res.map_err(|e| {
                Error::ExternalTool(format!("failed to start {}: {}", self.ffmpeg.display(), e))
            })?,
        };
        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(Error::ExternalTool(format!(
                "ffmpeg tagging exited with {}: {}",
                finished.status,
                stderr.trim()
            )));
        }

        tokio::fs::rename(output.path(), file).await?;
        output.keep();
        debug!(song_id = %data.id, cover = cover.is_some(), "tags embedded");
        Ok(())
    }

    async fn fetch_cover(
        &self,
        cancel: &CancellationToken,
        file: &Path,
        data: &SongData,
    ) -> Result<Option<Scratch>> {
        let Some(fetcher) = &self.covers else {
            return Ok(None);
        };
        if data.album.cover_url.is_empty() {
            return Ok(None);
        }

        let download = async {
            let response = fetcher.get(&data.album.cover_url).await?;
            response.bytes().await.map_err(Error::from)
        };
        let image = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = download => res?,
        };

        let cover = Scratch::new(suffixed(file, "cover.jpg"));
        tokio::fs::write(cover.path(), &image).await?;
        Ok(Some(cover))
    }
}

/// `-metadata key=value` pairs for every known field of `data`
fn metadata_args(data: &SongData) -> Vec<String> {
    let artists: Vec<&str> = data.artists.iter().map(|a| a.name.as_str()).collect();
    let lead = artists.first().copied().unwrap_or_default();

    let tags = [
        ("title", data.title.clone()),
        ("artist", lead.to_string()),
        ("artists", artists.join("; ")),
        ("album", data.album.title.clone()),
        ("album_artist", lead.to_string()),
        ("track", data.track_number.to_string()),
        ("disc", data.volume_number.to_string()),
        ("date", data.release_date.clone()),
        ("isrc", data.isrc.clone()),
    ];

    tags.into_iter()
        .filter(|(_, value)| !value.is_empty())
        .flat_map(|(key, value)| ["-metadata".to_string(), format!("{}={}", key, value)])
        .collect()
}

fn suffixed(file: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(file.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
