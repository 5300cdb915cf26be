//! Download pipeline
//!
//! One [`DownloadTask`] is one fetch: HTTP GET (optionally with Basic Auth), stream the body
//! into the content store, then decide whether the new artifact duplicates an earlier one.
//! Duplicates are deleted; new artifacts are optionally copied to a canonical "current"
//! alias.
//!
//! Every failure is an [`Error`] whose retryability is decided by
//! [`IsRetryable`](crate::retry::IsRetryable):
//!
//! | Step                         | Failure                 | Retryable |
//! |------------------------------|-------------------------|-----------|
//! | build / send request         | `Request`               | yes       |
//! | non-2xx status               | `HttpStatus`            | yes       |
//! | open writer                  | `Store`                 | yes       |
//! | stream body / close writer   | `BodyCopy`              | yes       |
//! | deadline elapsed             | `Timeout`               | yes       |
//! | naming / scope pattern       | `MalformedSource`       | no        |
//! | delete confirmed duplicate   | `DuplicateDelete`       | no        |
//! | copy to canonical alias      | `AliasCopy`             | no        |

use crate::config::BasicAuth;
use crate::dedup;
use crate::error::{Error, Result};
use crate::naming::{self, NamingRule};
use crate::store::ContentStore;
use futures::StreamExt;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;


/// Result of one download attempt; `Ok` means stored (or confirmed duplicate and removed)
pub type DownloadOutcome = Result<()>;

/// A single file to fetch, consumed by one [`Downloader::download`] run
#[derive(Clone, Debug)]
pub struct DownloadTask {
    /// Absolute URL to fetch
    pub source_url: String,
    /// Directory-like prefix of the stored name
    pub path_prefix: String,
    /// How the rest of the stored name is derived
    pub naming: NamingRule,
    /// Timestamp inserted into the stored name
    pub file_prefix: String,
    /// Fixed path that receives a copy of every new artifact
    pub canonical_alias: Option<String>,
    /// Pattern whose first group, applied to the stored name, is the dedup scope
    pub dedup_pattern: Regex,
    /// Wall-clock budget for fetch+store+dedup
    pub deadline: Duration,
    /// HTTP Basic Auth credentials
    pub credentials: Option<BasicAuth>,
}

/// Runs download tasks against one HTTP client and one content store
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    store: Arc<dyn ContentStore>,
}

impl Downloader {
    /// Create a downloader from an existing client
    pub fn new(client: reqwest::Client, store: Arc<dyn ContentStore>) -> Self {
        Self { client, store }
    }

    /// Create a downloader with a fresh client sending `user_agent`
    ///
    /// No client-level timeout is set; every attempt is bounded by its task deadline.
    pub fn with_user_agent(user_agent: &str, store: Arc<dyn ContentStore>) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self::new(client, store))
    }

    /// The HTTP client shared with other fetches (source logs, notifications)
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The content store artifacts are written to
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Fetch, store and dedup one task
    ///
    /// The whole attempt is bounded by `task.deadline`; running out of time is a transient
    /// [`Error::Timeout`]. Cancellation aborts in-flight I/O and returns [`Error::Cancelled`].
    /// A partially written artifact may remain after either; the next cycle re-fetches and
    /// re-checks its scope.
    pub async fn download(&self, task: &DownloadTask, cancel: &CancellationToken) -> DownloadOutcome {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(task.deadline, self.fetch_and_store(task)) => {
                result.unwrap_or_else(|_| {
                    tracing::warn!(url = %task.source_url, deadline = ?task.deadline, "download deadline exceeded");
                    Err(Error::Timeout {
                        url: task.source_url.clone(),
                        deadline: task.deadline,
                    })
                })
            }
        }
    }

    async fn fetch_and_store(&self, task: &DownloadTask) -> DownloadOutcome {
        let mut request = self.client.get(&task.source_url);
        if let Some(auth) = &task.credentials {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(url = %task.source_url, error = %e, "web get failed");
            Error::Request(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %task.source_url, status = %status, "webserver gave non-ok response");
            return Err(Error::HttpStatus {
                url: task.source_url.clone(),
                status,
            });
        }

        let name = naming::compute_stored_name(task)?;
        let mut writer = self.store.open_writer(&name).await?;

        let copy_error = |reason: String| {
            tracing::warn!(artifact = %name, error = %reason, "copy error");
            Error::BodyCopy {
                name: name.clone(),
                reason,
            }
        };

        let mut body = response.bytes_stream();
        let mut bytes: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| copy_error(e.to_string()))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| copy_error(e.to_string()))?;
            bytes += chunk.len() as u64;
        }
        writer
            .shutdown()
            .await
            .map_err(|e| copy_error(e.to_string()))?;

        tracing::debug!(artifact = %name, bytes, "artifact written");

        let scope = naming::compute_dedup_scope(&name, &task.dedup_pattern)?;
        if dedup::is_new(&*self.store, &name, &scope).await {
            tracing::info!(artifact = %name, scope = %scope, bytes, "stored new artifact");
            if let Some(alias) = &task.canonical_alias {
                self.store.copy(&name, alias).await.map_err(|source| {
                    tracing::error!(artifact = %name, alias = %alias, error = %source, "copy to current failed");
                    Error::AliasCopy {
                        name: name.clone(),
                        alias: alias.clone(),
                        source,
                    }
                })?;
                tracing::debug!(artifact = %name, alias = %alias, "canonical alias updated");
            }
        } else {
            tracing::info!(artifact = %name, scope = %scope, "duplicate content, removing artifact");
            self.store.delete(&name).await.map_err(|source| {
                tracing::error!(artifact = %name, error = %source, "duplicate deletion failed");
                Error::DuplicateDelete {
                    name: name.clone(),
                    source,
                }
            })?;
        }

        Ok(())
    }
}
