//! Bounded outbound HTTP
//!
//! Every request the engine issues goes through a [`Fetcher`]. A single shared
//! semaphore caps the number of requests waiting on response headers, so a user
//! with many registered instances cannot open an unbounded number of sockets.

use std::pin::Pin;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio::sync::Semaphore;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};

/// Boxed byte stream handed between fetcher, providers and the library
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Concurrency-limited HTTP client shared by all providers
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    /// Build a fetcher from the resolver settings
    ///
    /// # Errors
    /// Returns `Error::Internal` if the TLS backend cannot be initialized
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_in_flight_requests.max(1))),
        })
    }

    /// Number of requests that could start right now without waiting
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Issue a GET and return the response once headers arrived with a 2xx status
    ///
    /// The admission permit is held until the response headers are in; reading the
    /// body afterwards does not count against the cap.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| Error::Internal("fetch semaphore closed".to_string()))?;
            self.client.get(url).send().await?
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = %status, "request rejected");
            return Err(Error::transport(url, format!("HTTP {}", status)));
        }
        Ok(response)
    }

    /// GET `url` and decode the body as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::decode(url, e))
    }

    /// GET `url` and expose the body as a byte stream
    pub async fn get_stream(&self, url: &str) -> Result<ByteReader> {
        let response = self.get(url).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::other(e.to_string()));
        Ok(Box::pin(StreamReader::new(stream)))
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}
