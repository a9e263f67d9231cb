//! Provider abstraction
//!
//! A provider is one variant of an upstream catalogue API (for example a specific
//! hifi-api version in front of the Tidal catalogue). The task registry and the
//! supervisor only ever talk to the [`Provider`] trait and look variants up by
//! name in an explicitly owned [`ProviderRegistry`].
//!
//! Several variants may serve the same catalogue. Lookups by catalogue try them
//! in descending [`Provider::priority`] order and return the first success.

pub mod hifi;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{ByteReader, Fetcher};
use crate::models::{AlbumData, ArtistData, PlaylistData, SearchData, SongData};
use crate::resolver::InstanceResolver;
use crate::types::{DownloadKind, Quality, UserId};

pub use hifi::Hifi;

/// How long a single provider gets to recognise an instance during detection
const DETECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Audio payload returned by [`Provider::download`]
pub struct AudioStream {
    /// Audio bytes, in container order
    pub reader: ByteReader,
    /// File extension without the dot ("flac", "m4a")
    pub extension: String,
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

/// Capability set every provider variant implements
///
/// Catalogue operations race the user's registered instances and return
/// normalized records; the wire format of each variant never leaves it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// API name instances are registered under (e.g. "hifi")
    fn name(&self) -> &str;

    /// Upstream catalogue served by this API (e.g. "tidal")
    fn provider(&self) -> &str;

    /// Rank among the variants serving the same catalogue; higher is tried first
    fn priority(&self) -> i32 {
        0
    }

    /// Fetch a single track
    async fn song(&self, cancel: &CancellationToken, user: UserId, id: &str) -> Result<SongData>;

    /// Fetch an album with its track listing
    async fn album(&self, cancel: &CancellationToken, user: UserId, id: &str)
    -> Result<AlbumData>;

    /// Fetch an artist with a de-duplicated discography
    async fn artist(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
    ) -> Result<ArtistData>;

    /// Fetch a playlist with its track listing
    async fn playlist(
        &self,
        _cancel: &CancellationToken,
        _user: UserId,
        _id: &str,
    ) -> Result<PlaylistData> {
        Err(Error::Validation(format!(
            "{} does not support playlists",
            self.name()
        )))
    }

    /// Search the catalogue for songs, albums and artists matching `query`
    async fn search(
        &self,
        _cancel: &CancellationToken,
        _user: UserId,
        _query: &str,
    ) -> Result<SearchData> {
        Err(Error::Validation(format!(
            "{} does not support search",
            self.name()
        )))
    }

    /// Open the audio stream of a track
    ///
    /// Normalized metadata is published on `progress` as soon as it is known,
    /// before any audio byte is transferred.
    async fn download(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        id: &str,
        quality: Quality,
        progress: mpsc::Sender<SongData>,
    ) -> Result<AudioStream>;

    /// Check whether `url` is a live instance of this API
    async fn status(&self, cancel: &CancellationToken, url: &str) -> Result<()>;

    /// Map a public catalogue link to the kind and id it points at
    fn parse_url(&self, url: &str) -> Result<(DownloadKind, String)> {
        Err(Error::Validation(format!(
            "{} cannot resolve links like {}",
            self.name(),
            url
        )))
    }
}

/// Read-only view of the instances a user registered per API
#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    /// Base urls registered by `user` for `api`, in no particular order
    async fn list_instances(&self, user: UserId, api: &str) -> Result<Vec<String>>;
}

/// In-memory instance directory
///
/// Useful for embedding applications that keep instances in their own store, and
/// for tests.
#[derive(Default)]
pub struct StaticDirectory {
    instances: RwLock<HashMap<(UserId, String), Vec<String>>>,
}

impl StaticDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `url` for `user` under `api`
    pub async fn add(&self, user: UserId, api: &str, url: impl Into<String>) {
        let url = url.into();
        let mut instances = self.instances.write().await;
        let urls = instances.entry((user, api.to_string())).or_default();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
}

#[async_trait]
impl InstanceDirectory for StaticDirectory {
    async fn list_instances(&self, user: UserId, api: &str) -> Result<Vec<String>> {
        Ok(self
            .instances
            .read()
            .await
            .get(&(user, api.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Explicitly owned lookup of provider variants by API name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in provider variant
    ///
    /// All variants share one bounded fetcher, so `max_in_flight_requests` caps
    /// outbound requests across providers.
    pub fn with_defaults(config: &Config, instances: Arc<dyn InstanceDirectory>) -> Result<Self> {
        let fetcher = Fetcher::new(&config.resolver)?;
        let resolver = InstanceResolver::new(fetcher, &config.resolver);

        let mut registry = Self::new();
        registry.register(Arc::new(Hifi::new(resolver, instances, &config.tools)));
        Ok(registry)
    }

    /// Register a provider under its API name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Look up a provider by API name
    ///
    /// # Errors
    /// Returns `Error::Validation` if no provider is registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown provider '{}'", name)))
    }

    /// Registered API names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Variants serving the `provider` catalogue, highest priority first
    ///
    /// Variants of equal priority are ordered by API name.
    pub fn variants(&self, provider: &str) -> Vec<Arc<dyn Provider>> {
        let mut variants: Vec<Arc<dyn Provider>> = self
            .providers
            .values()
            .filter(|p| p.provider() == provider)
            .cloned()
            .collect();
        variants.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        variants
    }

    /// Run `op` against each variant of `provider` in turn until one succeeds
    ///
    /// # Errors
    /// - `Error::Validation` if no variant serves `provider`
    /// - `Error::Cancelled` as soon as `cancel` fires or a variant reports it
    /// - the last variant's error when every variant failed
    pub async fn first_variant<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        provider: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(Arc<dyn Provider>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let variants = self.variants(provider);
        if variants.is_empty() {
            return Err(Error::Validation(format!(
                "no provider serves the '{}' catalogue",
                provider
            )));
        }

        let mut last = None;
        for variant in variants {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let api = variant.name().to_string();
            match op(variant).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(provider, api = %api, error = %e, "variant failed, trying the next one");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| Error::Internal("no variant was tried".to_string())))
    }

    /// Fetch a track from the first variant of `provider` that has it
    pub async fn song(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        provider: &str,
        id: &str,
    ) -> Result<SongData> {
        self.first_variant(cancel, provider, |variant| async move {
            variant.song(cancel, user, id).await
        })
        .await
    }

    /// Fetch an album from the first variant of `provider` that has it
    pub async fn album(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        provider: &str,
        id: &str,
    ) -> Result<AlbumData> {
        self.first_variant(cancel, provider, |variant| async move {
            variant.album(cancel, user, id).await
        })
        .await
    }

    /// Fetch an artist from the first variant of `provider` that has it
    pub async fn artist(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        provider: &str,
        id: &str,
    ) -> Result<ArtistData> {
        self.first_variant(cancel, provider, |variant| async move {
            variant.artist(cancel, user, id).await
        })
        .await
    }

    /// Search the `provider` catalogue through the first variant that answers
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        user: UserId,
        provider: &str,
        query: &str,
    ) -> Result<SearchData> {
        self.first_variant(cancel, provider, |variant| async move {
            variant.search(cancel, user, query).await
        })
        .await
    }

    /// Find which registered API an instance url speaks
    ///
    /// Every provider's status check runs concurrently; the first one that
    /// recognises the instance wins and the others are cancelled.
    ///
    /// # Errors
    /// - `Error::Cancelled` if `cancel` fires first
    /// - `Error::NotFound` if no provider recognises the url
    pub async fn detect(&self, cancel: &CancellationToken, url: &str) -> Result<Arc<dyn Provider>> {
        let race = cancel.child_token();
        let mut checks = JoinSet::new();

        for provider in self.providers.values() {
            let provider = provider.clone();
            let token = race.child_token();
            let url = url.to_string();
            checks.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    res = tokio::time::timeout(DETECT_TIMEOUT, provider.status(&token, &url)) => {
                        res.unwrap_or_else(|_| Err(Error::transport(url.as_str(), "status check timed out")))
                    }
                };
                (provider, outcome)
            });
        }

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(Error::Cancelled),
                joined = checks.join_next() => match joined {
                    Some(Ok((provider, Ok(())))) => break Ok(provider),
                    Some(Ok((provider, Err(e)))) => {
                        debug!(api = provider.name(), url = %url, error = %e, "instance not recognised");
                    }
                    Some(Err(e)) => debug!(url = %url, error = %e, "status check aborted"),
                    None => break Err(Error::NotFound(format!("no provider recognises {}", url))),
                },
            }
        };

        race.cancel();
        checks.abort_all();
        while checks.join_next().await.is_some() {}

        result
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
