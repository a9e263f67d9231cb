//! hifi-api v2.2 provider for the Tidal catalogue
//!
//! Every catalogue call races the user's registered hifi instances through the
//! [`InstanceResolver`]; payloads are validated before they can win a race, then
//! normalized into the shared models.

mod album;
mod artist;
mod download;
mod playlist;
mod remux;
mod search;
mod song;
mod status;
mod wire;


use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{AudioStream, InstanceDirectory, Provider};
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::models::{AlbumData, ArtistData, ArtistRef, PlaylistData, SearchData, SongData};
use crate::resolver::InstanceResolver;
use crate::types::{DownloadKind, Quality, UserId};

/// Public catalogue host whose links `parse_url` understands
const CATALOGUE_HOST: &str = "tidal.com";

/// hifi-api v2.2 client
pub struct Hifi {
    resolver: InstanceResolver,
    instances: Arc<dyn InstanceDirectory>,
    ffmpeg: Option<PathBuf>,
}

impl Hifi {
    /// API name instances are registered under
    pub const NAME: &'static str = "hifi";

    /// Upstream catalogue
    pub const PROVIDER: &'static str = "tidal";

    /// Create a provider reading instance urls from `instances`
    ///
    /// ffmpeg is located once, up front; without it hi-res downloads fail while
    /// every other operation keeps working.
    pub fn new(
        resolver: InstanceResolver,
        instances: Arc<dyn InstanceDirectory>,
        tools: &ToolsConfig,
    ) -> Self {
        Self {
            resolver,
            instances,
            ffmpeg: tools.resolve_ffmpeg(),
        }
    }

    /// Race a validated JSON GET across the user's instances
    async fn fetch<T, B>(&self, cancel: &CancellationToken, user: UserId, build: B) -> Result<T>
    where
        T: Payload,
        B: Fn(&str) -> String,
    {
        let urls = self.instances.list_instances(user, Self::NAME).await?;
        self.resolver
            .race(Self::NAME, cancel, &urls, |base, _token| {
                let fetcher = self.resolver.fetcher().clone();
                let url = build(base.trim_end_matches('/'));
                async move {
                    let payload: T = fetcher.get_json(&url).await?;
                    if payload.is_complete() {
                        Ok(payload)
                    } else {
                        Err(Error::decode(
                            T::CONTEXT,
                            format!("incomplete payload from {}", url),
                        ))
                    }
                }
            })
            .await
    }
}

/// A decoded response that can tell whether it carries usable data
trait Payload: DeserializeOwned + Send + 'static {
    /// What is being decoded, for error messages
    const CONTEXT: &'static str;

    fn is_complete(&self) -> bool;
}

fn artist_refs(artists: &[wire::Artist]) -> Vec<ArtistRef> {
    artists
        .iter()
        .map(|a| ArtistRef {
            id: a.id.to_string(),
            name: a.name.clone(),
        })
        .collect()
}

fn query(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}

#[async_trait]
impl Provider for Hifi {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn provider(&self) -> &str {
        Self::PROVIDER
    }

    fn priority(&self) -> i32 {
        1
    }

    async fn song(&self, cancel: &CancellationToken, user: UserId, id: &str) -> Result<SongData> {
        let (song, _) = self.song_with_playback(cancel, user, id, None).await?;
        Ok(song)
    }

    async fn album(&self, cancel: &CancellationToken, user: UserId, id: &str) -> Result<AlbumData> {
        self.fetch_album(cancel, user, id).await
    }

    async fn artist(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
    ) -> Result<ArtistData> {
        self.fetch_artist(cancel, user, id).await
    }

    async fn playlist(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
    ) -> Result<PlaylistData> {
        self.fetch_playlist(cancel, user, id).await
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        query: &str,
    ) -> Result<SearchData> {
        self.run_search(cancel, user, query).await
    }

    async fn download(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
        quality: Quality,
        progress: mpsc::Sender<SongData>,
    ) -> Result<AudioStream> {
        self.open_stream(cancel, user, id, quality, progress).await
    }

    async fn status(&self, cancel: &CancellationToken, url: &str) -> Result<()> {
        self.check_status(cancel, url).await
    }

    fn parse_url(&self, url: &str) -> Result<(DownloadKind, String)> {
        parse_catalogue_url(url)
    }
}

/// Accepts `https://tidal.com/{track|album|artist|playlist}/{id}`, with an optional
/// `browse/` prefix and `album/{id}/track/{id}` pointing at a single track
fn parse_catalogue_url(raw: &str) -> Result<(DownloadKind, String)> {
    let invalid = || Error::Validation(format!("not a {} catalogue link: {}", CATALOGUE_HOST, raw));

    let parsed = url::Url::parse(raw).map_err(|_| invalid())?;
    let host = parsed.host_str().unwrap_or_default();
    if host != CATALOGUE_HOST && !host.ends_with(".tidal.com") {
        return Err(invalid());
    }

    let mut segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if segments.first() == Some(&"browse") {
        segments.remove(0);
    }

    match segments.as_slice() {
        ["album", _, "track", id] => Ok((DownloadKind::Song, id.to_string())),
        [kind, id] => Ok((kind.parse::<DownloadKind>()?, id.to_string())),
        _ => Err(invalid()),
    }
}
