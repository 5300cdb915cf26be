//! # dataset-dl
//!
//! Periodic mirror for public datasets that are republished in place or appended to over time.
//!
//! Every cycle fetches each configured source, stores new artifacts under timestamped
//! names in a content store, removes artifacts whose content already exists in their dedup
//! scope, and keeps a stable "current" alias pointing at the newest copy. Two kinds of
//! source are supported:
//!
//! - **Sequenced logs** (RouteViews prefix-to-AS): a creation log lists files by seqnum; only
//!   entries above the source's watermark are fetched.
//! - **Fixed files** (MaxMind GeoLite2): the same URLs are fetched every cycle, optionally with
//!   HTTP Basic Auth.
//!
//! Transient failures are retried with exponential backoff; a cycle in which every source
//! succeeded publishes one notification.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dataset_dl::{Config, CycleRunner, Downloader, FsStore, NoopSink};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::default());
//!     let store = Arc::new(FsStore::new(&config.store.root));
//!     let downloader = Downloader::with_user_agent(&config.download.user_agent, store)?;
//!
//!     let mut runner = CycleRunner::new(config, downloader, Arc::new(NoopSink))?;
//!     let report = runner.run_cycle(&CancellationToken::new()).await;
//!     println!("success: {}", report.is_success());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Status API server
pub mod api;
/// Configuration types
pub mod config;
/// One pass over every configured source
pub mod cycle;
/// Content-hash duplicate detection
pub mod dedup;
/// Fetch, store and dedup a single file
pub mod download;
/// Error types
pub mod error;
/// Artifact naming and dedup scopes
pub mod naming;
/// Cycle-completion notifications
pub mod notify;
/// Retry logic with exponential backoff
pub mod retry;
/// Jittered cycle loop
pub mod scheduler;
/// Incremental reader for sequenced generation logs
pub mod source_log;
/// Content store contract and adapters
pub mod store;
/// Reports and status types
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, SourceConfig};
pub use cycle::CycleRunner;
pub use download::{DownloadOutcome, DownloadTask, Downloader};
pub use error::{Error, Result, StoreError};
pub use notify::{HttpTopicSink, NoopSink, NotificationSink};
pub use retry::{IsRetryable, run_with_retry};
pub use scheduler::Scheduler;
pub use store::{ContentStore, FsStore, MemoryStore};
pub use types::{CycleNotification, CycleReport, SourceReport, StatusSnapshot};

/// Cancel `cancel` once a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns early, without waiting for a signal, if the token is cancelled by someone else.
pub async fn shutdown_on_signal(cancel: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("shutting down, no new cycles will start");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
