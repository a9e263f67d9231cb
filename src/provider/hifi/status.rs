use tokio_util::sync::CancellationToken;

use super::Hifi;
use super::wire::Status;
use crate::error::{Error, Result};

/// Version string a compatible instance reports
pub(super) const API_VERSION: &str = "2.2";

/// Upstream project a compatible instance reports
pub(super) const API_REPO: &str = "https://github.com/uimaxbai/hifi-api";

impl Hifi {
    /// Fetch the instance root and check it identifies as hifi-api v2.2
    pub(super) async fn check_status(&self, cancel: &CancellationToken, url: &str) -> Result<()> {
        let fetcher = self.resolver.fetcher();
        let ceiling = self.resolver.attempt_timeout();

        let status: Status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = tokio::time::timeout(ceiling, fetcher.get_json::<Status>(url)) => {
                res.map_err(|_| Error::transport(url, "status check timed out"))??
            }
        };

        if status.version != API_VERSION || status.repo != API_REPO {
            return Err(Error::Validation(format!(
                "{} reports {} {}, expected hifi-api {}",
                url, status.repo, status.version, API_VERSION
            )));
        }
        Ok(())
    }
}
