use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::song::COVER_SIZE;
use super::wire::{AlbumHit, AlbumResults, ArtistHit, ArtistResults, Envelope, SongResults, Track};
use super::{Hifi, Payload, artist_refs, query};
use crate::error::{Error, Result};
use crate::models::{AlbumRef, SearchAlbum, SearchArtist, SearchData, SearchSong};
use crate::normalize::image_url;
use crate::types::{Quality, UserId};

const PICTURE_SIZE: u32 = 750;

// No hits is a valid answer for every category
impl Payload for Envelope<SongResults> {
    const CONTEXT: &'static str = "song search";

    fn is_complete(&self) -> bool {
        true
    }
}

impl Payload for Envelope<AlbumResults> {
    const CONTEXT: &'static str = "album search";

    fn is_complete(&self) -> bool {
        true
    }
}

impl Payload for Envelope<ArtistResults> {
    const CONTEXT: &'static str = "artist search";

    fn is_complete(&self) -> bool {
        true
    }
}

impl Hifi {
    /// Songs, albums and artists are searched concurrently, each raced on its own
    ///
    /// A category whose race fails is left empty; the search only fails when all
    /// three do, with the song search's error.
    pub(super) async fn run_search(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        text: &str,
    ) -> Result<SearchData> {
        let term = query(text);
        let (songs, albums, artists) = tokio::join!(
            self.fetch::<Envelope<SongResults>, _>(cancel, user, |base| {
                format!("{}/search/?s={}", base, term)
            }),
            self.fetch::<Envelope<AlbumResults>, _>(cancel, user, |base| {
                format!("{}/search/?al={}", base, term)
            }),
            self.fetch::<Envelope<ArtistResults>, _>(cancel, user, |base| {
                format!("{}/search/?a={}", base, term)
            }),
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (songs, albums, artists) = match (songs, albums, artists) {
            (Err(e), Err(_), Err(_)) => return Err(e),
            found => found,
        };

        Ok(SearchData {
            songs: category("songs", songs)
                .map(|r| r.data.items.iter().map(search_song).collect())
                .unwrap_or_default(),
            albums: category("albums", albums)
                .map(|r| r.data.albums.items.iter().map(search_album).collect())
                .unwrap_or_default(),
            artists: category("artists", artists)
                .map(|r| r.data.artists.items.iter().map(search_artist).collect())
                .unwrap_or_default(),
        })
    }
}

fn category<T>(name: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(found) => Some(found),
        Err(e) => {
            debug!(category = name, error = %e, "search category unavailable");
            None
        }
    }
}

fn search_song(track: &Track) -> SearchSong {
    SearchSong {
        id: track.id.to_string(),
        title: track.title.clone(),
        duration: track.duration,
        audio_quality: Quality::from_tags(&track.media_metadata.tags),
        popularity: track.popularity,
        explicit: track.explicit,
        artists: artist_refs(&track.artists),
        album: AlbumRef {
            id: track.album.id.to_string(),
            title: track.album.title.clone(),
            cover_url: image_url(&track.album.cover, COVER_SIZE),
        },
    }
}

fn search_album(album: &AlbumHit) -> SearchAlbum {
    SearchAlbum {
        id: album.id.to_string(),
        title: album.title.clone(),
        duration: album.duration,
        cover_url: image_url(&album.cover, COVER_SIZE),
        audio_quality: Quality::from_tags(&album.media_metadata.tags),
        explicit: album.explicit,
        popularity: album.popularity,
        artists: artist_refs(&album.artists),
    }
}

fn search_artist(artist: &ArtistHit) -> SearchArtist {
    SearchArtist {
        id: artist.id.to_string(),
        name: artist.name.clone(),
        picture_url: image_url(&artist.picture, PICTURE_SIZE),
        popularity: artist.popularity,
    }
}
