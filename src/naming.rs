//! Artifact naming and dedup scopes
//!
//! A stored name is built from the task's path prefix, a per-run timestamp prefix, and
//! either a fixed filename or two pieces cut out of the source URL:
//!
//! ```text
//! fixed:   path_prefix + file_prefix + filename
//! pattern: path_prefix + group1 + file_prefix + group2
//! ```
//!
//! The dedup scope is the first capture group of a second pattern applied to the stored
//! name. It normally drops the per-run timestamp so that a new file is compared with every
//! earlier copy of the same dataset, not only files from the same run.

use crate::download::DownloadTask;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;

/// How the final path segment of an artifact is derived
#[derive(Clone, Debug)]
pub enum NamingRule {
    /// Two-group pattern applied to the source URL; the timestamp goes between the groups
    UrlPattern(Regex),
    /// Filename used as is, after the timestamp prefix
    FixedFilename(String),
}

/// Compute the name a task's artifact is stored under
pub fn compute_stored_name(task: &DownloadTask) -> Result<String> {
    match &task.naming {
        NamingRule::FixedFilename(filename) => Ok(format!(
            "{}{}{}",
            task.path_prefix, task.file_prefix, filename
        )),
        NamingRule::UrlPattern(pattern) => {
            let malformed = || Error::MalformedSource {
                input: task.source_url.clone(),
                pattern: pattern.as_str().to_string(),
            };
            if pattern.captures_len() < 3 {
                return Err(malformed());
            }
            let caps = pattern.captures(&task.source_url).ok_or_else(malformed)?;
            let group = |i| caps.get(i).map_or("", |m| m.as_str());
            Ok(format!(
                "{}{}{}{}",
                task.path_prefix,
                group(1),
                task.file_prefix,
                group(2)
            ))
        }
    }
}

/// First capture group of `pattern` applied to a stored name
pub fn compute_dedup_scope(stored_name: &str, pattern: &Regex) -> Result<String> {
    pattern
        .captures(stored_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::MalformedSource {
            input: stored_name.to_string(),
            pattern: pattern.as_str().to_string(),
        })
}

/// Timestamp inserted into artifact names, e.g. `20240102T030405Z-`
pub fn timestamp_prefix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ-").to_string()
}

/// Date directory appended to fixed-file prefixes, e.g. `2024/01/02/`
pub fn date_path(now: DateTime<Utc>) -> String {
    now.format("%Y/%m/%d/").to_string()
}
