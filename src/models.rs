//! Normalized catalogue records
//!
//! Every provider converges on these shapes. They are built fresh for each call
//! and handed out by value; nothing mutates them after construction.

use serde::{Deserialize, Serialize};

use crate::types::Quality;

/// Artist reference by id and name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    /// Provider-side artist id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Album reference carried by a song
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    /// Provider-side album id
    pub id: String,
    /// Album title
    pub title: String,
    /// Cover art URL (empty when the provider has none)
    pub cover_url: String,
}

/// A single track with everything needed to file and tag it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongData {
    /// Upstream catalogue (e.g. "tidal")
    pub provider: String,
    /// Provider API that produced the record (e.g. "hifi")
    pub api: String,
    pub id: String,
    pub title: String,
    /// Seconds
    pub duration: u32,
    pub replay_gain: f64,
    pub peak: f64,
    pub album_replay_gain: f64,
    pub album_peak: f64,
    /// `YYYY-MM-DD`
    pub release_date: String,
    pub track_number: u32,
    pub volume_number: u32,
    pub audio_quality: Quality,
    pub explicit: bool,
    pub popularity: u32,
    pub isrc: String,
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
}

/// A track as listed inside an album
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSong {
    pub id: String,
    pub title: String,
    pub duration: u32,
    pub track_number: u32,
    pub volume_number: u32,
    pub explicit: bool,
    pub isrc: String,
    pub audio_quality: Quality,
    pub artists: Vec<ArtistRef>,
}

/// An album with its track listing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumData {
    pub provider: String,
    pub api: String,
    pub id: String,
    pub title: String,
    pub duration: u32,
    pub release_date: String,
    pub number_tracks: u32,
    pub number_volumes: u32,
    pub cover_url: String,
    pub explicit: bool,
    pub audio_quality: Quality,
    pub artists: Vec<ArtistRef>,
    pub songs: Vec<AlbumSong>,
}

/// A release in an artist's discography
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistAlbum {
    pub id: String,
    pub title: String,
    pub duration: u32,
    pub release_date: String,
    pub cover_url: String,
    pub audio_quality: Quality,
    pub explicit: bool,
    pub artists: Vec<ArtistRef>,
}

/// An artist with a de-duplicated discography, newest first
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistData {
    pub provider: String,
    pub api: String,
    pub id: String,
    pub name: String,
    pub picture_url: String,
    pub albums: Vec<ArtistAlbum>,
    pub eps: Vec<ArtistAlbum>,
    pub singles: Vec<ArtistAlbum>,
}

/// A track as listed inside a playlist
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSong {
    pub id: String,
    pub title: String,
    pub duration: u32,
    pub explicit: bool,
    pub isrc: String,
    pub audio_quality: Quality,
    pub artists: Vec<ArtistRef>,
}

/// A user or editorial playlist
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub provider: String,
    pub api: String,
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: u32,
    pub number_of_tracks: u32,
    pub cover_url: String,
    pub last_updated: String,
    pub songs: Vec<PlaylistSong>,
}

/// A track matched by a catalogue search
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSong {
    pub id: String,
    pub title: String,
    pub duration: u32,
    pub audio_quality: Quality,
    pub popularity: u32,
    pub explicit: bool,
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
}

/// An album matched by a catalogue search
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAlbum {
    pub id: String,
    pub title: String,
    pub duration: u32,
    pub cover_url: String,
    pub audio_quality: Quality,
    pub explicit: bool,
    pub popularity: u32,
    pub artists: Vec<ArtistRef>,
}

/// An artist matched by a catalogue search
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArtist {
    pub id: String,
    pub name: String,
    pub picture_url: String,
    pub popularity: u32,
}

/// Songs, albums and artists matching one query, in provider ranking order
///
/// A category the provider could not answer is left empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchData {
    pub songs: Vec<SearchSong>,
    pub albums: Vec<SearchAlbum>,
    pub artists: Vec<SearchArtist>,
}
