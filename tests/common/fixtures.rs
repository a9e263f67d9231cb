//! Mock hifi-api instances and CDN

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audio bytes served by the mock CDN
pub const AUDIO: &[u8] = b"fLaC\x00\x00\x00\x22 not really a flac file";

fn track_json(id: u64, title: &str, number: u32) -> Value {
    json!({
        "id": id,
        "title": title,
        "duration": 215,
        "replayGain": -7.1,
        "peak": 0.98,
        "streamStartDate": "2020-05-01T00:00:00.000+0000",
        "trackNumber": number,
        "volumeNumber": 1,
        "isrc": "GBAYE2000123",
        "explicit": false,
        "audioQuality": "LOSSLESS",
        "mediaMetadata": { "tags": ["LOSSLESS"] },
        "artists": [{ "id": 9, "name": "The Band", "type": "MAIN" }],
        "album": { "id": 55, "title": "The Album", "cover": "aa-bb-cc" }
    })
}

/// Serve the CDN file every manifest points at
pub async fn start_cdn() -> MockServer {
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/audio.flac"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO))
        .mount(&cdn)
        .await;
    cdn
}

/// A healthy hifi-api v2.2 instance serving album 55 with tracks 4 and 5
///
/// `delay` is applied to every catalogue response.
pub async fn start_instance(cdn: &MockServer, delay: Duration) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "2.2",
            "repo": "https://github.com/uimaxbai/hifi-api"
        })))
        .mount(&server)
        .await;

    for (id, title, number) in [(4u64, "Fourth Song", 4u32), (5, "Fifth Song", 5)] {
        Mock::given(method("GET"))
            .and(path("/info/"))
            .and(query_param("id", id.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(delay)
                    .set_body_json(json!({ "version": "2.2", "data": track_json(id, title, number) })),
            )
            .mount(&server)
            .await;
    }

    let manifest = json!({ "mimeType": "audio/flac", "urls": [format!("{}/audio.flac", cdn.uri())] });
    Mock::given(method("GET"))
        .and(path("/track/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(json!({
                    "version": "2.2",
                    "data": {
                        "trackId": 4,
                        "audioQuality": "LOSSLESS",
                        "manifestMimeType": "application/vnd.tidal.bts",
                        "manifest": BASE64.encode(manifest.to_string()),
                        "trackReplayGain": -8.5,
                        "trackPeakAmplitude": 0.99,
                        "albumReplayGain": -9.0,
                        "albumPeakAmplitude": 1.0
                    }
                })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/album/"))
        .and(query_param("id", "55"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(json!({
                    "version": "2.2",
                    "data": {
                        "id": 55,
                        "title": "The Album",
                        "duration": 430,
                        "releaseDate": "2020-05-01",
                        "numberOfTracks": 2,
                        "numberOfVolumes": 1,
                        "cover": "aa-bb-cc",
                        "explicit": false,
                        "audioQuality": "LOSSLESS",
                        "mediaMetadata": { "tags": ["LOSSLESS"] },
                        "artists": [{ "id": 9, "name": "The Band" }],
                        "items": [
                            { "item": track_json(4, "Fourth Song", 4), "type": "track" },
                            { "item": track_json(5, "Fifth Song", 5), "type": "track" }
                        ]
                    }
                })),
        )
        .mount(&server)
        .await;

    server
}

/// An instance that answers everything with 502
pub async fn start_broken_instance() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    server
}
