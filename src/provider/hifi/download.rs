use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::wire::{BtsManifest, Mpd};
use super::{Hifi, remux};
use crate::error::{Error, Result};
use crate::http::{ByteReader, Fetcher};
use crate::models::SongData;
use crate::provider::AudioStream;
use crate::types::{Quality, UserId};

const MIME_BTS: &str = "application/vnd.tidal.bts";
const MIME_DASH: &str = "application/dash+xml";

/// Most media segments a single track may list (several hours of audio)
const MAX_SEGMENTS: u64 = 10_000;

impl Hifi {
    /// Resolve metadata and manifest, publish the metadata, then open the audio
    pub(super) async fn open_stream(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
        quality: Quality,
        progress: mpsc::Sender<SongData>,
    ) -> Result<AudioStream> {
        let (song, playback) = self
            .song_with_playback(cancel, user, id, Some(quality))
            .await?;

        // A closed receiver only means nobody is watching
        let _ = progress.send(song).await;

        let hires = playback.audio_quality == Quality::HiresLossless.as_api_str();
        if hires && quality != Quality::HiresLossless {
            return Err(Error::decode(
                "track playback",
                format!(
                    "instance returned {} for a {} request",
                    playback.audio_quality,
                    quality.as_api_str()
                ),
            ));
        }
        let extension = match playback.audio_quality.as_str() {
            "HI_RES_LOSSLESS" | "LOSSLESS" => "flac",
            _ => "m4a",
        };

        let manifest = BASE64
            .decode(playback.manifest.as_bytes())
            .map_err(|e| Error::decode("track manifest", e))?;
        let fetcher = self.resolver.fetcher();
        let reader = match playback.manifest_mime_type.as_str() {
            MIME_BTS => open_bts(fetcher, &manifest).await?,
            MIME_DASH => open_dash(fetcher, &manifest)?,
            other => {
                return Err(Error::decode(
                    "track manifest",
                    format!("unknown manifest type '{}'", other),
                ));
            }
        };

        let reader = if hires {
            let ffmpeg = self.ffmpeg.as_deref().ok_or_else(|| {
                Error::ExternalTool("ffmpeg is required for hi-res downloads".to_string())
            })?;
            remux::to_flac(ffmpeg, reader)?
        } else {
            reader
        };

        debug!(song_id = %id, extension, "audio stream opened");
        Ok(AudioStream {
            reader,
            extension: extension.to_string(),
        })
    }
}

/// Single-file manifest: stream the first listed url
async fn open_bts(fetcher: &Fetcher, manifest: &[u8]) -> Result<ByteReader> {
    let manifest: BtsManifest =
        serde_json::from_slice(manifest).map_err(|e| Error::decode("bts manifest", e))?;
    let url = manifest
        .urls
        .first()
        .ok_or_else(|| Error::decode("bts manifest", "no stream url"))?;
    fetcher.get_stream(url).await
}

/// Segmented manifest: fetch the segments one after another, in order
///
/// Nothing is requested until the returned reader is first polled.
fn open_dash(fetcher: &Fetcher, manifest: &[u8]) -> Result<ByteReader> {
    let xml = std::str::from_utf8(manifest).map_err(|e| Error::decode("dash manifest", e))?;
    let mpd: Mpd = quick_xml::de::from_str(xml).map_err(|e| Error::decode("dash manifest", e))?;
    let urls = segment_urls(&mpd)?;

    let fetcher = fetcher.clone();
    let segments = futures::stream::iter(urls)
        .then(move |url| {
            let fetcher = fetcher.clone();
            async move {
                let response = fetcher.get(&url).await.map_err(std::io::Error::other)?;
                Ok::<_, std::io::Error>(response.bytes_stream().map_err(std::io::Error::other))
            }
        })
        .try_flatten();

    Ok(Box::pin(StreamReader::new(segments)))
}

/// Expand the first representation's segment template into absolute segment urls
pub(super) fn segment_urls(mpd: &Mpd) -> Result<Vec<String>> {
    let template = mpd
        .periods
        .first()
        .and_then(|p| p.adaptation_sets.first())
        .and_then(|a| a.representations.first())
        .and_then(|r| r.segment_template.as_ref())
        .ok_or_else(|| Error::decode("dash manifest", "no segment template"))?;

    if template.media.is_empty() {
        return Err(Error::decode("dash manifest", "segment template has no media url"));
    }

    let mut urls = Vec::new();
    if !template.initialization.is_empty() {
        urls.push(template.initialization.clone());
    }

    let total = template
        .timeline
        .segments
        .iter()
        .map(|s| u64::try_from(s.repeat.unwrap_or(0)).unwrap_or(0).saturating_add(1))
        .fold(0u64, u64::saturating_add);
    if total > MAX_SEGMENTS {
        return Err(Error::decode(
            "dash manifest",
            format!("{} segments exceed the limit of {}", total, MAX_SEGMENTS),
        ));
    }

    let mut number = template.start_number.unwrap_or(1);
    for segment in &template.timeline.segments {
        let repeat = u64::try_from(segment.repeat.unwrap_or(0)).unwrap_or(0);
        for _ in 0..=repeat {
            urls.push(template.media.replacen("$Number$", &number.to_string(), 1));
            number = number.saturating_add(1);
        }
    }
    Ok(urls)
}
