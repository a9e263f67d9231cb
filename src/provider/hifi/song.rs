use tokio_util::sync::CancellationToken;

use super::wire::{Envelope, Playback, Track};
use super::{Hifi, Payload, artist_refs, query};
use crate::error::Result;
use crate::models::{AlbumRef, SongData};
use crate::normalize::{image_url, release_date, resolve_quality};
use crate::types::{Quality, UserId};

/// Cover size attached to songs and albums
pub(super) const COVER_SIZE: u32 = 1280;

impl Payload for Envelope<Track> {
    const CONTEXT: &'static str = "track info";

    fn is_complete(&self) -> bool {
        self.data.id != 0
    }
}

impl Payload for Envelope<Playback> {
    const CONTEXT: &'static str = "track playback";

    fn is_complete(&self) -> bool {
        !self.data.manifest.is_empty()
    }
}

impl Hifi {
    /// Race `/info` and `/track` together and merge them into one record
    ///
    /// The playback payload carries the replay-gain values the info payload lacks.
    /// Without a quality the instance picks its default stream.
    pub(super) async fn song_with_playback(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
        quality: Option<Quality>,
    ) -> Result<(SongData, Playback)> {
        let info = self.fetch::<Envelope<Track>, _>(cancel, user, |base| {
            format!("{}/info/?id={}", base, query(id))
        });
        let playback = self.fetch::<Envelope<Playback>, _>(cancel, user, |base| match quality {
            Some(q) => format!("{}/track/?id={}&quality={}", base, query(id), q.as_api_str()),
            None => format!("{}/track/?id={}", base, query(id)),
        });

        let (info, playback) = tokio::try_join!(info, playback)?;
        let song = self.normalize_song(&info.data, &playback.data);
        Ok((song, playback.data))
    }

    fn normalize_song(&self, track: &Track, playback: &Playback) -> SongData {
        SongData {
            provider: Self::PROVIDER.to_string(),
            api: Self::NAME.to_string(),
            id: track.id.to_string(),
            title: track.title.clone(),
            duration: track.duration,
            replay_gain: playback.track_replay_gain,
            peak: playback.track_peak_amplitude,
            album_replay_gain: playback.album_replay_gain,
            album_peak: playback.album_peak_amplitude,
            release_date: release_date(&track.stream_start_date),
            track_number: track.track_number,
            volume_number: track.volume_number,
            audio_quality: resolve_quality(
                Some(track.audio_quality.as_str()),
                &track.media_metadata.tags,
            ),
            explicit: track.explicit,
            popularity: track.popularity,
            isrc: track.isrc.clone(),
            artists: artist_refs(&track.artists),
            album: AlbumRef {
                id: track.album.id.to_string(),
                title: track.album.title.clone(),
                cover_url: image_url(&track.album.cover, COVER_SIZE),
            },
        }
    }
}
