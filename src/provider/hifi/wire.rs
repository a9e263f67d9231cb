//! hifi-api v2.2 response shapes
//!
//! Every field defaults so that instances running slightly different builds of
//! the API still decode; structural validity is checked where the data is used.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Status {
    pub version: String,
    pub repo: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(super) struct Artist {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(super) struct MediaMetadata {
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(super) struct TrackAlbum {
    pub id: u64,
    pub title: String,
    pub cover: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct Track {
    pub id: u64,
    pub title: String,
    pub duration: u32,
    pub replay_gain: f64,
    pub peak: f64,
    pub stream_start_date: String,
    pub track_number: u32,
    pub volume_number: u32,
    pub popularity: u32,
    pub isrc: String,
    pub explicit: bool,
    pub audio_quality: String,
    pub media_metadata: MediaMetadata,
    pub artists: Vec<Artist>,
    pub album: TrackAlbum,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct Playback {
    pub audio_quality: String,
    pub manifest_mime_type: String,
    pub manifest: String,
    pub track_replay_gain: f64,
    pub track_peak_amplitude: f64,
    pub album_replay_gain: f64,
    pub album_peak_amplitude: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Item<T> {
    pub item: T,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct Album {
    pub id: u64,
    pub title: String,
    pub duration: u32,
    pub release_date: String,
    pub number_of_tracks: u32,
    pub number_of_volumes: u32,
    pub cover: String,
    pub explicit: bool,
    pub audio_quality: String,
    pub media_metadata: MediaMetadata,
    pub artists: Vec<Artist>,
    pub items: Vec<Item<Track>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ArtistInfo {
    pub artist: ArtistProfile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ArtistProfile {
    pub id: u64,
    pub name: String,
    #[serde(alias = "pictureUrl")]
    pub picture: String,
    #[serde(rename = "selectedAlbumCoverFallback")]
    pub picture_fallback: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Discography {
    pub albums: Page<Release>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Page<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct Release {
    pub id: u64,
    pub title: String,
    pub duration: u32,
    pub release_date: String,
    pub cover: String,
    pub explicit: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub media_metadata: MediaMetadata,
    pub artists: Vec<Artist>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PlaylistPage {
    pub playlist: Playlist,
    pub items: Vec<Item<Track>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct Playlist {
    pub uuid: String,
    pub title: String,
    pub description: String,
    pub duration: u32,
    pub number_of_tracks: u32,
    pub square_image: String,
    pub last_updated: String,
}

/// `application/vnd.tidal.bts` manifest
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct BtsManifest {
    pub urls: Vec<String>,
}

/// `application/dash+xml` manifest, reduced to what segment expansion needs
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Mpd {
    #[serde(rename = "Period")]
    pub periods: Vec<Period>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Period {
    #[serde(rename = "AdaptationSet")]
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdaptationSet {
    #[serde(rename = "Representation")]
    pub representations: Vec<Representation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Representation {
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SegmentTemplate {
    #[serde(rename = "@initialization")]
    pub initialization: String,
    #[serde(rename = "@media")]
    pub media: String,
    #[serde(rename = "@startNumber")]
    pub start_number: Option<u64>,
    #[serde(rename = "SegmentTimeline")]
    pub timeline: SegmentTimeline,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SegmentTimeline {
    #[serde(rename = "S")]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Segment {
    #[serde(rename = "@r")]
    pub repeat: Option<i64>,
}

/// `/search/?s=` answer
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SongResults {
    pub items: Vec<Track>,
}

/// `/search/?al=` answer
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AlbumResults {
    pub albums: Page<AlbumHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct AlbumHit {
    pub id: u64,
    pub title: String,
    pub duration: u32,
    pub cover: String,
    pub explicit: bool,
    pub popularity: u32,
    pub media_metadata: MediaMetadata,
    pub artists: Vec<Artist>,
}

/// `/search/?a=` answer
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ArtistResults {
    pub artists: Page<ArtistHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ArtistHit {
    pub id: u64,
    pub name: String,
    pub picture: String,
    pub popularity: u32,
}
