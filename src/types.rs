//! Cycle reports, notifications and the status snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happened to one source during a cycle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Source name from the configuration
    pub source: String,

    /// Tasks that completed (stored or removed as duplicates)
    pub succeeded: usize,

    /// Tasks that failed after retries
    pub failed: usize,

    /// Watermark after the cycle, log-driven sources only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<i64>,

    /// Last error seen, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    /// Empty report for `source`
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Whether every task of this source succeeded
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

/// Outcome of one pass over all sources
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// When the cycle began
    pub started_at: DateTime<Utc>,

    /// When the cycle ended
    pub finished_at: DateTime<Utc>,

    /// Per-source results in configuration order
    pub sources: Vec<SourceReport>,

    /// Whether the completion notification was published
    pub notified: bool,

    /// Set when the cycle was interrupted by shutdown
    #[serde(default)]
    pub cancelled: bool,
}

impl CycleReport {
    /// True when every source succeeded and the cycle was not interrupted
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.sources.iter().all(SourceReport::is_success)
    }
}

/// Message published after a fully successful cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleNotification {
    /// Always `cycle_complete`
    pub event: String,

    /// Unix timestamp in seconds
    pub timestamp: i64,

    /// Names of the sources that were processed
    pub sources: Vec<String>,
}

impl CycleNotification {
    /// Notification for a finished cycle
    pub fn cycle_complete(report: &CycleReport) -> Self {
        Self {
            event: "cycle_complete".to_string(),
            timestamp: report.finished_at.timestamp(),
            sources: report.sources.iter().map(|s| s.source.clone()).collect(),
        }
    }
}

/// Process status served by the status endpoint
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// End of the last fully successful cycle
    pub last_success: Option<DateTime<Utc>>,

    /// Most recent cycle report
    pub last_cycle: Option<CycleReport>,

    /// Cycles run since start
    pub cycles_run: u64,

    /// Current watermark of every log-driven source
    pub watermarks: BTreeMap<String, i64>,
}

impl StatusSnapshot {
    /// Fold a finished cycle into the snapshot
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles_run += 1;
        if report.is_success() {
            self.last_success = Some(report.finished_at);
        }
        for source in &report.sources {
            if let Some(watermark) = source.watermark {
                self.watermarks.insert(source.source.clone(), watermark);
            }
        }
        self.last_cycle = Some(report.clone());
    }
}
