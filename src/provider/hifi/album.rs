use tokio_util::sync::CancellationToken;

use super::song::COVER_SIZE;
use super::wire::{Album, Envelope, Track};
use super::{Hifi, Payload, artist_refs, query};
use crate::error::Result;
use crate::models::{AlbumData, AlbumSong};
use crate::normalize::{image_url, resolve_quality};
use crate::types::UserId;

impl Payload for Envelope<Album> {
    const CONTEXT: &'static str = "album";

    fn is_complete(&self) -> bool {
        self.data.id != 0
    }
}

impl Hifi {
    pub(super) async fn fetch_album(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
    ) -> Result<AlbumData> {
        let album: Envelope<Album> = self
            .fetch(cancel, user, |base| format!("{}/album/?id={}", base, query(id)))
            .await?;
        let album = album.data;

        Ok(AlbumData {
            provider: Self::PROVIDER.to_string(),
            api: Self::NAME.to_string(),
            id: album.id.to_string(),
            title: album.title,
            duration: album.duration,
            release_date: album.release_date,
            number_tracks: album.number_of_tracks,
            number_volumes: album.number_of_volumes,
            cover_url: image_url(&album.cover, COVER_SIZE),
            explicit: album.explicit,
            audio_quality: resolve_quality(
                Some(album.audio_quality.as_str()),
                &album.media_metadata.tags,
            ),
            artists: artist_refs(&album.artists),
            songs: album
                .items
                .iter()
                .filter(|entry| entry.kind.is_empty() || entry.kind == "track")
                .map(|entry| album_song(&entry.item))
                .collect(),
        })
    }
}

fn album_song(track: &Track) -> AlbumSong {
    AlbumSong {
        id: track.id.to_string(),
        title: track.title.clone(),
        duration: track.duration,
        track_number: track.track_number,
        volume_number: track.volume_number,
        explicit: track.explicit,
        isrc: track.isrc.clone(),
        audio_quality: resolve_quality(
            Some(track.audio_quality.as_str()),
            &track.media_metadata.tags,
        ),
        artists: artist_refs(&track.artists),
    }
}
