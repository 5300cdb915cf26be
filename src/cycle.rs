//! One pass over every configured source
//!
//! Log-driven sources keep a watermark: the seqnum of the last entry known to be stored.
//! Entries of a batch are downloaded in log order and the watermark follows them only until
//! the first failure. Later entries are still attempted, but the next cycle starts again
//! from the failed one:
//!
//! ```text
//! watermark 3380, batch 3381 ok, 3382 fail, 3383 ok  ->  watermark 3381
//! ```
//!
//! Fixed-list sources have no watermark. Every file is fetched on every cycle and the dedup
//! check drops unchanged content.

use crate::config::{BasicAuth, Config, FixedFile, RetryConfig, SourceConfig, compile_pattern};
use crate::download::{DownloadTask, Downloader};
use crate::error::{Error, Result};
use crate::naming::{self, NamingRule};
use crate::notify::NotificationSink;
use crate::retry;
use crate::source_log::{self, SequencedEntry};
use crate::types::{CycleNotification, CycleReport, SourceReport};
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs download cycles and owns the per-source watermarks
pub struct CycleRunner {
    downloader: Downloader,
    sink: Arc<dyn NotificationSink>,
    config: Arc<Config>,
    sources: Vec<SourceState>,
}

struct SourceState {
    name: String,
    path_prefix: String,
    dedup_pattern: Regex,
    kind: SourceKind,
}

enum SourceKind {
    Log {
        log_url: String,
        url_pattern: Regex,
        canonical_alias: Option<String>,
        watermark: i64,
    },
    Fixed {
        basic_auth: bool,
        files: Vec<FixedFile>,
    },
}

/// Values shared by every task of one cycle
struct CycleContext<'a> {
    downloader: &'a Downloader,
    retry: &'a RetryConfig,
    deadline: Duration,
    credentials: Option<&'a BasicAuth>,
    date_path: String,
    cancel: &'a CancellationToken,
}

impl CycleRunner {
    /// Build a runner, compiling every source pattern
    ///
    /// Watermarks start at 0, so the first cycle fetches every entry of each log.
    pub fn new(
        config: Arc<Config>,
        downloader: Downloader,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .enumerate()
            .map(|(idx, source)| SourceState::compile(idx, source))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            downloader,
            sink,
            config,
            sources,
        })
    }

    /// Current watermark of every log-driven source
    pub fn watermarks(&self) -> BTreeMap<String, i64> {
        self.sources
            .iter()
            .filter_map(|s| match &s.kind {
                SourceKind::Log { watermark, .. } => Some((s.name.clone(), *watermark)),
                SourceKind::Fixed { .. } => None,
            })
            .collect()
    }

    /// Set the watermark of a log-driven source; false if there is no such source
    pub fn set_watermark(&mut self, source: &str, seqnum: i64) -> bool {
        self.sources
            .iter_mut()
            .filter(|s| s.name == source)
            .find_map(|s| match &mut s.kind {
                SourceKind::Log { watermark, .. } => {
                    *watermark = seqnum;
                    Some(())
                }
                SourceKind::Fixed { .. } => None,
            })
            .is_some()
    }

    /// Process every source once and publish a notification if all of them succeeded
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        let started_at = Utc::now();
        let ctx = CycleContext {
            downloader: &self.downloader,
            retry: &self.config.retry,
            deadline: self.config.download.timeout,
            credentials: self.config.credentials.as_ref(),
            date_path: naming::date_path(started_at),
            cancel,
        };

        tracing::info!(
            sources = self.sources.len(),
            parallel = self.config.schedule.parallel_sources,
            "starting download cycle"
        );

        let sources = if self.config.schedule.parallel_sources {
            futures::future::join_all(self.sources.iter_mut().map(|s| s.run(&ctx))).await
        } else {
            let mut reports = Vec::with_capacity(self.sources.len());
            for source in &mut self.sources {
                if cancel.is_cancelled() {
                    break;
                }
                reports.push(source.run(&ctx).await);
            }
            reports
        };

        let mut report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            sources,
            notified: false,
            cancelled: cancel.is_cancelled(),
        };

        if report.is_success() {
            match self
                .sink
                .publish(&CycleNotification::cycle_complete(&report))
                .await
            {
                Ok(()) => report.notified = true,
                Err(e) => tracing::warn!(error = %e, "failed to publish cycle notification"),
            }
            tracing::info!("all downloads succeeded");
        } else {
            let failed: Vec<&str> = report
                .sources
                .iter()
                .filter(|s| !s.is_success())
                .map(|s| s.source.as_str())
                .collect();
            tracing::warn!(
                failed_sources = ?failed,
                cancelled = report.cancelled,
                "cycle finished with failures"
            );
        }

        report
    }
}

impl SourceState {
    fn compile(idx: usize, source: &SourceConfig) -> Result<Self> {
        let key = format!("sources[{idx}]");
        match source {
            SourceConfig::SequencedLog {
                name,
                log_url,
                path_prefix,
                url_pattern,
                dedup_pattern,
                canonical_alias,
            } => Ok(Self {
                name: name.clone(),
                path_prefix: path_prefix.clone(),
                dedup_pattern: compile_pattern(dedup_pattern, &format!("{key}.dedup_pattern"))?,
                kind: SourceKind::Log {
                    log_url: log_url.clone(),
                    url_pattern: compile_pattern(url_pattern, &format!("{key}.url_pattern"))?,
                    canonical_alias: canonical_alias.clone(),
                    watermark: 0,
                },
            }),
            SourceConfig::FixedFiles {
                name,
                path_prefix,
                dedup_pattern,
                basic_auth,
                files,
            } => Ok(Self {
                name: name.clone(),
                path_prefix: path_prefix.clone(),
                dedup_pattern: compile_pattern(dedup_pattern, &format!("{key}.dedup_pattern"))?,
                kind: SourceKind::Fixed {
                    basic_auth: *basic_auth,
                    files: files.clone(),
                },
            }),
        }
    }

    async fn run(&mut self, ctx: &CycleContext<'_>) -> SourceReport {
        let mut report = SourceReport::new(&self.name);
        match &mut self.kind {
            SourceKind::Log {
                log_url,
                url_pattern,
                canonical_alias,
                watermark,
            } => {
                let entries = match fetch_log(ctx, log_url, *watermark).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        report.error = Some(e.to_string());
                        report.watermark = Some(*watermark);
                        return report;
                    }
                };

                tracing::info!(source = %self.name, watermark = *watermark, new = entries.len(), "new log entries");

                let mut advancing = true;
                for entry in entries {
                    if ctx.cancel.is_cancelled() {
                        break;
                    }
                    let task = DownloadTask {
                        source_url: entry.url,
                        path_prefix: self.path_prefix.clone(),
                        naming: NamingRule::UrlPattern(url_pattern.clone()),
                        file_prefix: naming::timestamp_prefix(Utc::now()),
                        canonical_alias: canonical_alias.clone(),
                        dedup_pattern: self.dedup_pattern.clone(),
                        deadline: ctx.deadline,
                        credentials: None,
                    };
                    match attempt(ctx, &task).await {
                        Ok(()) => {
                            report.succeeded += 1;
                            if advancing {
                                *watermark = entry.seqnum;
                            }
                        }
                        Err(e) => {
                            tracing::error!(source = %self.name, url = %task.source_url, seqnum = entry.seqnum, error = %e, "download failed");
                            report.failed += 1;
                            report.error = Some(e.to_string());
                            advancing = false;
                        }
                    }
                }
                report.watermark = Some(*watermark);
            }
            SourceKind::Fixed { basic_auth, files } => {
                let credentials = if *basic_auth {
                    ctx.credentials.cloned()
                } else {
                    None
                };
                let path_prefix = format!("{}{}", self.path_prefix, ctx.date_path);

                for file in files.iter() {
                    if ctx.cancel.is_cancelled() {
                        break;
                    }
                    let task = DownloadTask {
                        source_url: file.url.clone(),
                        path_prefix: path_prefix.clone(),
                        naming: NamingRule::FixedFilename(file.filename.clone()),
                        file_prefix: naming::timestamp_prefix(Utc::now()),
                        canonical_alias: file.canonical_alias.clone(),
                        dedup_pattern: self.dedup_pattern.clone(),
                        deadline: ctx.deadline,
                        credentials: credentials.clone(),
                    };
                    match attempt(ctx, &task).await {
                        Ok(()) => report.succeeded += 1,
                        Err(e) => {
                            tracing::error!(source = %self.name, file = %file.filename, error = %e, "download failed");
                            report.failed += 1;
                            report.error = Some(e.to_string());
                        }
                    }
                }
            }
        }
        report
    }
}

/// Fetch a generation log, bounded by the task deadline and the cancellation token
async fn fetch_log(
    ctx: &CycleContext<'_>,
    log_url: &str,
    watermark: i64,
) -> Result<Vec<SequencedEntry>> {
    let fetch = source_log::fetch_new_entries(ctx.downloader.client(), log_url, watermark);
    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(Error::Cancelled),
        result = tokio::time::timeout(ctx.deadline, fetch) => {
            result.unwrap_or_else(|_| {
                tracing::warn!(url = %log_url, deadline = ?ctx.deadline, "generation log deadline exceeded");
                Err(Error::Timeout {
                    url: log_url.to_string(),
                    deadline: ctx.deadline,
                })
            })
        }
    }
}

async fn attempt(ctx: &CycleContext<'_>, task: &DownloadTask) -> Result<()> {
    retry::run_with_retry(ctx.retry, ctx.cancel, || {
        ctx.downloader.download(task, ctx.cancel)
    })
    .await
}
