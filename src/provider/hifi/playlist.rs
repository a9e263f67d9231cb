use tokio_util::sync::CancellationToken;

use super::wire::PlaylistPage;
use super::{Hifi, Payload, artist_refs, query};
use crate::error::Result;
use crate::models::{PlaylistData, PlaylistSong};
use crate::normalize::{image_url, resolve_quality};
use crate::types::UserId;

const PLAYLIST_COVER_SIZE: u32 = 640;

impl Payload for PlaylistPage {
    const CONTEXT: &'static str = "playlist";

    fn is_complete(&self) -> bool {
        !self.playlist.uuid.is_empty()
    }
}

impl Hifi {
    pub(super) async fn fetch_playlist(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
    ) -> Result<PlaylistData> {
        let page: PlaylistPage = self
            .fetch(cancel, user, |base| format!("{}/playlist/?id={}", base, query(id)))
            .await?;
        let playlist = page.playlist;

        // Videos share the listing with tracks
        let songs = page
            .items
            .iter()
            .filter(|entry| entry.kind == "track")
            .map(|entry| {
                let track = &entry.item;
                PlaylistSong {
                    id: track.id.to_string(),
                    title: track.title.clone(),
                    duration: track.duration,
                    explicit: track.explicit,
                    isrc: track.isrc.clone(),
                    audio_quality: resolve_quality(
                        Some(track.audio_quality.as_str()),
                        &track.media_metadata.tags,
                    ),
                    artists: artist_refs(&track.artists),
                }
            })
            .collect();

        Ok(PlaylistData {
            provider: Self::PROVIDER.to_string(),
            api: Self::NAME.to_string(),
            id: playlist.uuid,
            title: playlist.title,
            description: playlist.description,
            duration: playlist.duration,
            number_of_tracks: playlist.number_of_tracks,
            cover_url: image_url(&playlist.square_image, PLAYLIST_COVER_SIZE),
            last_updated: playlist.last_updated,
            songs,
        })
    }
}
