//! Core types and events for music-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::SongData;

/// Identifier of the user owning tasks and instances
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifier of a download task, unique per user and never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

macro_rules! id_newtype {
    ($name:ident) => {
        impl $name {
            /// Get the inner u64 value
            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(TaskId);

/// Download task status
///
/// `Pending → Running → {Done | Failed | Cancelled}`; an accepted retry moves a
/// Failed or Cancelled task back to Pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, attempt not started yet
    Pending,
    /// Attempt in flight
    Running,
    /// Downloaded and saved
    Done,
    /// Last attempt failed
    Failed,
    /// Last attempt was cancelled by the user
    Cancelled,
}

impl Status {
    /// Done, Failed and Cancelled end an attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Cancelled)
    }

    /// Only Failed and Cancelled tasks accept a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Status::Failed | Status::Cancelled)
    }

    /// Lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio quality tier, totally ordered from worst to best
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Quality {
    /// Lossy, low bitrate
    Low = 1,
    /// Lossy, high bitrate
    #[default]
    High = 2,
    /// CD quality lossless
    Lossless = 3,
    /// 24-bit lossless
    HiresLossless = 4,
}

impl Quality {
    /// Name used by provider APIs (`LOW`, `HIGH`, `LOSSLESS`, `HI_RES_LOSSLESS`)
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Quality::Low => "LOW",
            Quality::High => "HIGH",
            Quality::Lossless => "LOSSLESS",
            Quality::HiresLossless => "HI_RES_LOSSLESS",
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Quality::Low),
            "HIGH" => Ok(Quality::High),
            "LOSSLESS" => Ok(Quality::Lossless),
            "HI_RES_LOSSLESS" | "HIRES_LOSSLESS" | "HIRESLOSSLESS" => Ok(Quality::HiresLossless),
            other => Err(Error::Validation(format!("unknown quality '{}'", other))),
        }
    }
}

/// What a download request points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    /// A single track
    Song,
    /// Every track of an album
    Album,
    /// Every album of an artist
    Artist,
    /// Every track of a playlist
    Playlist,
}

impl std::str::FromStr for DownloadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "song" | "track" => Ok(DownloadKind::Song),
            "album" => Ok(DownloadKind::Album),
            "artist" => Ok(DownloadKind::Artist),
            "playlist" => Ok(DownloadKind::Playlist),
            other => Err(Error::Validation(format!("unknown download type '{}'", other))),
        }
    }
}

/// User-facing download request, as received from an outer API layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Registered provider API name (e.g. "hifi")
    pub api: String,
    /// "song", "album", "artist" or "playlist"
    #[serde(rename = "type")]
    pub kind: String,
    /// Catalogue id on the provider side
    pub id: String,
    /// Requested quality, falls back to the configured default
    #[serde(default)]
    pub quality: Option<String>,
}

/// Point-in-time snapshot of a task, as returned by `list`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Task id
    pub id: TaskId,
    /// Provider API the task downloads from
    pub api: String,
    /// Catalogue id of the song
    pub song_id: String,
    /// Requested quality
    pub quality: Quality,
    /// Current status
    pub status: Status,
    /// Last known normalized metadata (filled in mid-download)
    pub data: Option<SongData>,
    /// Message of the last failure, if the task is Failed
    pub error: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

/// Events broadcast by the download manager
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task was created
    TaskQueued {
        /// Owner
        user: UserId,
        /// Task id
        id: TaskId,
    },
    /// A task changed status
    StatusChanged {
        /// Owner
        user: UserId,
        /// Task id
        id: TaskId,
        /// New status
        status: Status,
    },
    /// Normalized metadata became available for a running task
    MetadataUpdated {
        /// Owner
        user: UserId,
        /// Task id
        id: TaskId,
    },
    /// A task was evicted from the registry
    TaskRemoved {
        /// Owner
        user: UserId,
        /// Task id
        id: TaskId,
    },
    /// The manager is shutting down
    Shutdown,
}
