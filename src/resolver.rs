//! Instance racing
//!
//! Every provider is mirrored across several redundant instances. The
//! [`InstanceResolver`] runs the same request against all of them at once and
//! resolves to whichever valid answer arrives first. There is no priority among
//! instances: the first arrival wins, and every other in-flight attempt is
//! cancelled and joined before the race returns.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::http::Fetcher;

/// Races an operation across a provider's registered instances
#[derive(Clone, Debug)]
pub struct InstanceResolver {
    fetcher: Fetcher,
    attempt_timeout: Duration,
}

impl InstanceResolver {
    /// Create a resolver issuing its requests through `fetcher`
    pub fn new(fetcher: Fetcher, config: &ResolverConfig) -> Self {
        Self {
            fetcher,
            attempt_timeout: config.instance_timeout,
        }
    }

    /// Shared bounded fetcher
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Ceiling applied to every single instance attempt
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Run `op` against every url and return the first success
    ///
    /// `op` receives the instance base url and a token that fires when the race is
    /// decided, the caller cancels, or the attempt is otherwise torn down. Each
    /// attempt is bounded by the resolver's attempt timeout.
    ///
    /// # Errors
    /// - `Error::Cancelled` if `cancel` fires before any attempt succeeded
    /// - `Error::NoInstance` if `urls` is empty or every attempt failed; it carries
    ///   the last failure observed
    pub async fn race<T, F, Fut>(
        &self,
        api: &str,
        cancel: &CancellationToken,
        urls: &[String],
        op: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(String, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if urls.is_empty() {
            return Err(Error::NoInstance {
                api: api.to_string(),
                last: None,
            });
        }

        let race = cancel.child_token();
        let mut attempts = JoinSet::new();

        for url in urls {
            let token = race.child_token();
            let attempt = op(url.clone(), token.clone());
            let ceiling = self.attempt_timeout;
            let url = url.clone();

            attempts.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    res = tokio::time::timeout(ceiling, attempt) => match res {
                        Ok(outcome) => outcome,
                        Err(_) => Err(Error::transport(
                            url.as_str(),
                            format!("timed out after {}ms", ceiling.as_millis()),
                        )),
                    },
                };
                (url, outcome)
            });
        }

        let mut last: Option<Error> = None;
        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(Error::Cancelled),
                joined = attempts.join_next() => match joined {
                    Some(Ok((url, Ok(value)))) => {
                        debug!(api = %api, url = %url, "instance won the race");
                        break Ok(value);
                    }
                    Some(Ok((url, Err(e)))) => {
                        debug!(api = %api, url = %url, error = %e, "instance attempt failed");
                        last = Some(e);
                    }
                    Some(Err(e)) => {
                        debug!(api = %api, error = %e, "instance attempt aborted");
                        last = Some(Error::Internal(format!("instance attempt aborted: {}", e)));
                    }
                    None => {
                        break Err(Error::NoInstance {
                            api: api.to_string(),
                            last: last.take().map(Box::new),
                        });
                    }
                },
            }
        };

        race.cancel();
        attempts.abort_all();
        while attempts.join_next().await.is_some() {}

        result
    }
}
