//! Configuration types for music-dl

use crate::error::{Error, Result};
use crate::types::Quality;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (library location, concurrency, quality)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root of the per-user music libraries (default: "./library")
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Maximum attempts transferring audio at the same time (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Quality requested when a download request does not name one (default: HiresLossless)
    #[serde(default = "default_quality")]
    pub default_quality: Quality,

    /// How long `shutdown()` waits for supervisors to wind down (default: 30s)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Write tags and cover art into saved tracks when ffmpeg is available (default: true)
    #[serde(default = "default_true")]
    pub embed_tags: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            default_quality: default_quality(),
            shutdown_timeout: default_shutdown_timeout(),
            embed_tags: true,
        }
    }
}

/// Instance racing and outbound HTTP configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Ceiling for a single instance request (default: 5s)
    ///
    /// Composed with the caller's cancellation, so one slow instance never
    /// stalls a race past this bound.
    #[serde(default = "default_instance_timeout", with = "duration_serde")]
    pub instance_timeout: Duration,

    /// Global cap on in-flight outbound requests (default: 50)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_requests: usize,

    /// User-Agent header sent to instances and the media CDN
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            instance_timeout: default_instance_timeout(),
            max_in_flight_requests: default_max_in_flight(),
            user_agent: default_user_agent(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

impl ToolsConfig {
    /// Locate ffmpeg: explicit path first, then PATH lookup if enabled
    pub fn resolve_ffmpeg(&self) -> Option<PathBuf> {
        if let Some(path) = &self.ffmpeg_path {
            return Some(path.clone());
        }
        if self.search_path {
            return which::which("ffmpeg").ok();
        }
        None
    }
}

/// Persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database holding the instance directory (default: "./music-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for the download manager
///
/// All fields have sensible defaults; `Config::default()` works out of the box.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Instance racing and outbound HTTP
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Reject settings that would deadlock or disable the engine
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("download.max_concurrent_downloads".to_string()),
            });
        }
        if self.resolver.max_in_flight_requests == 0 {
            return Err(Error::Config {
                message: "max_in_flight_requests must be at least 1".to_string(),
                key: Some("resolver.max_in_flight_requests".to_string()),
            });
        }
        if self.resolver.instance_timeout.is_zero() {
            return Err(Error::Config {
                message: "instance_timeout must be greater than zero".to_string(),
                key: Some("resolver.instance_timeout".to_string()),
            });
        }
        Ok(())
    }
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("./library")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_quality() -> Quality {
    Quality::HiresLossless
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_instance_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_in_flight() -> usize {
    50
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/118.0.0.0 Safari/537.36"
        .to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./music-dl.db")
}

fn default_true() -> bool {
    true
}

/// Durations are (de)serialized as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
