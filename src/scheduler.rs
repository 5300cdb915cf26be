//! Run cycles forever with a jittered delay between them

use crate::config::ScheduleConfig;
use crate::cycle::CycleRunner;
use crate::types::{CycleReport, StatusSnapshot};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Random delay uniformly distributed over `interval ± deviation/2`, never negative
pub fn uniform_sleep_time(interval: Duration, deviation: Duration) -> Duration {
    let offset: f64 = rand::thread_rng().gen_range(-0.5..=0.5);
    let secs = interval.as_secs_f64() + offset * deviation.as_secs_f64();
    Duration::from_secs_f64(secs.max(0.0))
}

/// Drives a [`CycleRunner`] and publishes its progress to a shared [`StatusSnapshot`]
pub struct Scheduler {
    runner: CycleRunner,
    schedule: ScheduleConfig,
    status: Arc<RwLock<StatusSnapshot>>,
}

impl Scheduler {
    /// Create a scheduler with a fresh status snapshot
    pub fn new(runner: CycleRunner, schedule: ScheduleConfig) -> Self {
        let status = StatusSnapshot {
            watermarks: runner.watermarks(),
            ..Default::default()
        };
        Self {
            runner,
            schedule,
            status: Arc::new(RwLock::new(status)),
        }
    }

    /// Handle to the status snapshot, e.g. for the status API
    pub fn status(&self) -> Arc<RwLock<StatusSnapshot>> {
        self.status.clone()
    }

    /// Run one cycle and record it in the status snapshot
    pub async fn run_once(&mut self, cancel: &CancellationToken) -> CycleReport {
        let report = self.runner.run_cycle(cancel).await;
        self.status.write().await.record(&report);
        report
    }

    /// Loop until `cancel` fires
    ///
    /// A cycle in progress when cancellation arrives stops at its next task boundary; no new
    /// cycle is started afterwards.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("scheduler started");
        while !cancel.is_cancelled() {
            let report = self.run_once(&cancel).await;
            if report.cancelled {
                break;
            }

            let delay = uniform_sleep_time(self.schedule.interval, self.schedule.deviation);
            info!(
                success = report.is_success(),
                next_cycle_in_secs = delay.as_secs(),
                "cycle complete, sleeping"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => debug!("sleep finished"),
            }
        }
        info!("scheduler shutting down");
    }
}
