//! Incremental reader for sequenced generation logs
//!
//! Upstream publishers append one record per generated file:
//!
//! ```text
//! # seqnum  timestamp   path
//! 3381      1497844800  2017/06/routeviews-rv2-20170618-1200.pfx2as.gz
//! ```
//!
//! Paths are relative to the directory holding the log. Only records newer than the
//! caller's watermark are returned, in log order.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static RECORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(\d+)\s+(\S+)").unwrap());

/// One file announced by a generation log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencedEntry {
    /// Absolute URL of the file
    pub url: String,
    /// Position in the log; strictly increasing
    pub seqnum: i64,
}

/// Everything up to and including the last `/` of `url`
pub fn directory_of(url: &str) -> &str {
    match url.rfind('/') {
        Some(idx) => &url[..=idx],
        None => "",
    }
}

/// Extract entries with `seqnum > watermark` from a log body
///
/// Lines that are not `seqnum timestamp path` records are skipped, as are records whose
/// seqnum does not fit an `i64`.
pub fn parse_log(body: &str, log_url: &str, watermark: i64) -> Vec<SequencedEntry> {
    let base = directory_of(log_url);
    body.lines()
        .filter_map(|line| {
            let caps = RECORD.captures(line)?;
            let seqnum = match caps[1].parse::<i64>() {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(line = %line, error = %e, "log record has unusable seqnum");
                    return None;
                }
            };
            (seqnum > watermark).then(|| SequencedEntry {
                url: format!("{base}{}", &caps[3]),
                seqnum,
            })
        })
        .collect()
}

/// Fetch `log_url` and return the entries newer than `watermark`
pub async fn fetch_new_entries(
    client: &reqwest::Client,
    log_url: &str,
    watermark: i64,
) -> Result<Vec<SequencedEntry>> {
    let source_error = |reason: String| {
        tracing::warn!(url = %log_url, error = %reason, "could not read generation log");
        Error::SourceLog {
            url: log_url.to_string(),
            reason,
        }
    };

    let response = client
        .get(log_url)
        .send()
        .await
        .map_err(|e| source_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(source_error(format!(
            "webserver gave response code {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| source_error(e.to_string()))?;

    let entries = parse_log(&body, log_url, watermark);
    tracing::debug!(url = %log_url, watermark, new = entries.len(), "generation log parsed");
    Ok(entries)
}
