use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{HealthReport, Liveness, SubsystemHealth, SubsystemUnhealthy};
use crate::supervisor::subsystem::Subsystem;

pub const DEFAULT_PERIOD_SECS: u64 = 10;
pub const DEFAULT_BOARD_PERIOD_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub period: Duration,
    pub board_period: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(DEFAULT_PERIOD_SECS),
            board_period: Duration::from_secs(DEFAULT_BOARD_PERIOD_SECS),
        }
    }
}

/// Passive poller over the supervised subsystems.
/// Reads liveness and status only; never starts, stops or restarts anything.
pub struct HealthMonitor {
    targets: Vec<Arc<dyn Subsystem>>,
    config: MonitorConfig,
    sink: Option<mpsc::Sender<HealthReport>>,
    polls: u64,
}

impl HealthMonitor {
    pub fn new(targets: Vec<Arc<dyn Subsystem>>, config: &MonitorConfig) -> Self {
        Self {
            targets,
            config: *config,
            sink: None,
            polls: 0,
        }
    }

    /// Every report is offered to `sink` without waiting; a full sink skips it.
    pub fn with_sink(mut self, sink: mpsc::Sender<HealthReport>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// One pass: liveness, then status, for every target.
    pub fn poll(&mut self) -> HealthReport {
        self.polls += 1;
        let mut subsystems = Vec::with_capacity(self.targets.len());
        let mut issues = Vec::new();

        for target in &self.targets {
            let id = target.id().to_string();

            // 1. Liveness
            let liveness = Liveness::from_probe(target.is_running());
            if liveness == Liveness::NotRunning {
                warn!(subsystem = %id, "Subsystem is not running");
                issues.push(SubsystemUnhealthy { id: id.clone() });
            }

            // 2. Status
            let status = target.status();
            if let Some(report) = &status {
                info!(subsystem = %id, status = %report.status, details = ?report.details, "Subsystem status");
            }

            subsystems.push(SubsystemHealth {
                id,
                liveness,
                status,
            });
        }

        HealthReport {
            poll: self.polls,
            checked_at: Utc::now(),
            subsystems,
            issues,
        }
    }

    /// One line per subsystem.
    pub fn log_board(&self) {
        info!("--- Status board ({} subsystems) ---", self.targets.len());
        for target in &self.targets {
            let liveness = Liveness::from_probe(target.is_running());
            info!("  {:<24} {}", target.id(), liveness.label());
        }
    }

    /// Polls every `period` (first poll one period after start) until cancelled.
    /// Returns the number of polls made.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        let start = Instant::now();
        let mut ticker = interval_at(start + self.config.period, self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut board = interval_at(start + self.config.board_period, self.config.board_period);
        board.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            subsystems = self.targets.len(),
            "Health monitor started. Period: {:?}", self.config.period
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.poll();
                    if let Some(sink) = &self.sink {
                        if sink.try_send(report).is_err() {
                            debug!("Health report sink full or closed, report skipped");
                        }
                    }
                }
                _ = board.tick() => self.log_board(),
            }
        }

        info!(polls = self.polls, "Health monitor stopped");
        self.polls
    }
}
