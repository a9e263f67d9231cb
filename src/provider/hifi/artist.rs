use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::wire::{ArtistInfo, Discography, Release};
use super::{Hifi, Payload, artist_refs, query};
use crate::error::Result;
use crate::models::{ArtistAlbum, ArtistData};
use crate::normalize::{self, dedupe_releases, image_url};
use crate::types::{Quality, UserId};

const PICTURE_SIZE: u32 = 750;
const RELEASE_COVER_SIZE: u32 = 640;

impl Payload for ArtistInfo {
    const CONTEXT: &'static str = "artist";

    fn is_complete(&self) -> bool {
        self.artist.id != 0
    }
}

impl Payload for Discography {
    const CONTEXT: &'static str = "discography";

    // An artist without releases is a valid answer
    fn is_complete(&self) -> bool {
        true
    }
}

impl normalize::Release for Release {
    fn title(&self) -> &str {
        &self.title
    }

    fn release_date(&self) -> &str {
        &self.release_date
    }

    fn explicit(&self) -> bool {
        self.explicit
    }

    fn tag_count(&self) -> usize {
        self.media_metadata.tags.len()
    }
}

impl Hifi {
    pub(super) async fn fetch_artist(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
    ) -> Result<ArtistData> {
        let info = self.fetch::<ArtistInfo, _>(cancel, user, |base| {
            format!("{}/artist/?id={}", base, query(id))
        });
        let discography = self.fetch::<Discography, _>(cancel, user, |base| {
            format!("{}/artist/?f={}&skip_tracks=1", base, query(id))
        });
        let (info, discography) = tokio::try_join!(info, discography)?;

        let profile = info.artist;
        let picture = if profile.picture.is_empty() {
            &profile.picture_fallback
        } else {
            &profile.picture
        };

        let mut artist = ArtistData {
            provider: Self::PROVIDER.to_string(),
            api: Self::NAME.to_string(),
            id: profile.id.to_string(),
            name: profile.name.clone(),
            picture_url: image_url(picture, PICTURE_SIZE),
            ..Default::default()
        };

        for release in dedupe_releases(discography.albums.items) {
            let kind = release.kind.clone();
            let entry = artist_album(release);
            match kind.as_str() {
                "ALBUM" => artist.albums.push(entry),
                "EP" => artist.eps.push(entry),
                "SINGLE" => artist.singles.push(entry),
                other => debug!(artist_id = %id, kind = %other, "skipping release of unknown type"),
            }
        }

        Ok(artist)
    }
}

/// Discography entries carry tags but no declared quality, so they rank from High
fn artist_album(release: Release) -> ArtistAlbum {
    ArtistAlbum {
        id: release.id.to_string(),
        audio_quality: Quality::from_tags(&release.media_metadata.tags),
        cover_url: image_url(&release.cover, RELEASE_COVER_SIZE),
        artists: artist_refs(&release.artists),
        title: release.title,
        duration: release.duration,
        release_date: release.release_date,
        explicit: release.explicit,
    }
}
