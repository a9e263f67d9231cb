//! # music-dl
//!
//! Concurrent music download orchestration for self-hosted library applications.
//!
//! Users queue songs, albums, artists or playlists from pluggable catalogue
//! providers. Every provider is mirrored by redundant instances; each catalogue
//! call races all of a user's instances and keeps the first valid answer.
//! Every queued song becomes a task driven by its own supervisor, which can be
//! cancelled, retried or removed at any point. Saved tracks are tagged and get
//! their cover attached when ffmpeg is available.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use music_dl::{Config, Database, DownloadManager, FsLibrary, ProviderRegistry, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//!     let providers = ProviderRegistry::with_defaults(&config, db.clone())?;
//!     let library = Arc::new(FsLibrary::from_config(&config)?);
//!
//!     let manager = DownloadManager::new(config, providers, library).await?;
//!     let found = manager.search(UserId(1), "tidal", "daft punk").await?;
//!     if let Some(album) = found.albums.first() {
//!         manager.add_album(UserId(1), "hifi", &album.id, None).await?;
//!     }
//!
//!     for task in manager.list(UserId(1)).await {
//!         println!("{} {} {}", task.id, task.song_id, task.status);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Instance directory persistence
pub mod db;
/// Task registry and supervisors (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Bounded HTTP fetching
pub mod http;
/// Where downloaded tracks are saved
pub mod library;
/// Normalized catalogue records
#[allow(missing_docs)]
pub mod models;
/// Provider payload normalization
pub mod normalize;
/// Catalogue providers
pub mod provider;
/// First-success instance racing
pub mod resolver;
/// Tag and cover embedding
pub mod tagging;
/// Core types and events
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_tools;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use downloader::DownloadManager;
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use http::Fetcher;
pub use library::{FsLibrary, Library};
pub use models::{AlbumData, ArtistData, PlaylistData, SearchData, SongData};
pub use provider::{
    AudioStream, InstanceDirectory, Provider, ProviderRegistry, StaticDirectory,
};
pub use resolver::InstanceResolver;
pub use tagging::Tagger;
pub use types::{DownloadKind, DownloadRequest, Event, Quality, Status, TaskId, TaskInfo, UserId};

/// Run the manager until a termination signal arrives, then shut it down.
///
/// - **Unix:** SIGTERM or SIGINT. A handler that cannot be registered is skipped.
/// - **Windows/other:** Ctrl+C.
///
/// # Example
///
/// ```no_run
/// use music_dl::{DownloadManager, run_with_shutdown};
///
/// async fn serve(manager: DownloadManager) -> music_dl::Result<()> {
///     run_with_shutdown(manager).await
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    async fn next(signal: &mut Option<Signal>) {
        match signal {
            Some(signal) => {
                signal.recv().await;
            }
            None => std::future::pending().await,
        }
    }

    let register = |kind: SignalKind, name: &str| match signal(kind) {
        Ok(signal) => Some(signal),
        Err(e) => {
            tracing::warn!(error = %e, signal = name, "could not register signal handler");
            None
        }
    };
    let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
    let mut sigint = register(SignalKind::interrupt(), "SIGINT");

    if sigterm.is_none() && sigint.is_none() {
        tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    tokio::select! {
        _ = next(&mut sigterm) => tracing::info!("Received SIGTERM signal"),
        _ = next(&mut sigint) => tracing::info!("Received SIGINT signal (Ctrl+C)"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
