//! Startup and shutdown ordering for the harness.
//!
//! Subsystems come up in dependency order, then the input pipeline, then the
//! health monitor. Shutdown runs the other way round and is best-effort.

pub mod order;
pub mod subsystem;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::SupervisorError;
use crate::kernel::controller::ChannelController;
use crate::kernel::pipeline::{Pipeline, PipelineExit, RunningPipeline};
use crate::monitor::{HealthMonitor, HealthReport, MonitorConfig};

pub use order::start_order;
pub use subsystem::{StatusReport, Subsystem};

pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    /// Bound on each subsystem's `stop()`.
    pub stop_timeout: Duration,
    /// Bound on joining the listener loops.
    pub join_timeout: Duration,
    pub monitor: MonitorConfig,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
            monitor: MonitorConfig::default(),
        }
    }
}

/// What happened during shutdown. Nothing in here aborts the shutdown itself.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Ids in the order their `stop()` was called and returned Ok.
    pub stopped: Vec<String>,
    /// `(id, reason)` for stops that returned an error.
    pub failed: Vec<(String, String)>,
    pub timed_out: Vec<String>,
    pub pipeline: PipelineExit,
    pub monitor_polls: u64,
}

#[derive(Debug, Default)]
struct StopOutcome {
    stopped: Vec<String>,
    failed: Vec<(String, String)>,
    timed_out: Vec<String>,
}

pub struct Supervisor {
    controller: Arc<ChannelController>,
    settings: SupervisorSettings,
    declared: Vec<Arc<dyn Subsystem>>,
    /// Successfully started, in start order.
    supervised: Vec<Arc<dyn Subsystem>>,
    probe: Option<Arc<dyn Subsystem>>,
    report_sink: Option<mpsc::Sender<HealthReport>>,
    pipeline: Option<RunningPipeline>,
    monitor: Option<(CancellationToken, JoinHandle<u64>)>,
    started: bool,
    shut_down: bool,
}

impl Supervisor {
    pub fn new(controller: Arc<ChannelController>, settings: SupervisorSettings) -> Self {
        Self {
            controller,
            settings,
            declared: Vec::new(),
            supervised: Vec::new(),
            probe: None,
            report_sink: None,
            pipeline: None,
            monitor: None,
            started: false,
            shut_down: false,
        }
    }

    /// Declare a subsystem. Declaration order is the preferred start order.
    pub fn register(&mut self, subsystem: Arc<dyn Subsystem>) {
        self.declared.push(subsystem);
    }

    pub fn set_report_sink(&mut self, sink: mpsc::Sender<HealthReport>) {
        self.report_sink = Some(sink);
    }

    pub fn controller(&self) -> Arc<ChannelController> {
        self.controller.clone()
    }

    /// Ids of the subsystems started so far, in start order.
    pub fn supervised(&self) -> Vec<String> {
        self.supervised.iter().map(|s| s.id().to_string()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.started && !self.shut_down
    }

    /// Resolves the start order without starting anything.
    pub fn plan(&self) -> Result<Vec<String>, SupervisorError> {
        let decls: Vec<(&str, &[String])> = self
            .declared
            .iter()
            .map(|s| (s.id(), s.depends_on()))
            .collect();
        let order = start_order(&decls)?;
        Ok(order
            .into_iter()
            .map(|i| self.declared[i].id().to_string())
            .collect())
    }

    /// Starts every declared subsystem, then the pipeline, then the monitor.
    ///
    /// A failing `start()` aborts: later subsystems are never started, the ones
    /// already running are stopped in reverse order, and the master switch is
    /// turned off.
    pub async fn start_all(&mut self, pipeline: Pipeline) -> Result<(), SupervisorError> {
        if self.started {
            return Err(SupervisorError::AlreadyStarted);
        }

        // 1. Resolve order before touching anything
        let decls: Vec<(&str, &[String])> = self
            .declared
            .iter()
            .map(|s| (s.id(), s.depends_on()))
            .collect();
        let order = start_order(&decls)?;
        self.started = true;

        // 2. Subsystems
        for i in order {
            let subsystem = self.declared[i].clone();
            let id = subsystem.id().to_string();
            info!(subsystem = %id, "Starting subsystem");
            match subsystem.start().await {
                Ok(()) => self.supervised.push(subsystem),
                Err(source) => {
                    error!(subsystem = %id, "Startup aborted: {}", source);
                    self.controller.set_engine_on(false);
                    let rollback = self.stop_supervised().await;
                    info!(stopped = ?rollback.stopped, "Rolled back started subsystems");
                    self.shut_down = true;
                    return Err(SupervisorError::StartFailed { id, source });
                }
            }
        }

        // 3. Input pipeline
        self.controller.set_engine_on(true);
        let probe: Arc<dyn Subsystem> = pipeline.probe();
        self.probe = Some(probe.clone());
        self.pipeline = Some(pipeline.launch());

        // 4. Health monitor
        let mut targets = self.supervised.clone();
        targets.push(probe);
        let mut monitor = HealthMonitor::new(targets, &self.settings.monitor);
        if let Some(sink) = &self.report_sink {
            monitor = monitor.with_sink(sink.clone());
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(cancel.clone()));
        self.monitor = Some((cancel, handle));

        info!(subsystems = ?self.supervised(), "All subsystems started");
        Ok(())
    }

    /// An immediate poll outside the monitor's schedule.
    pub fn check_now(&self) -> HealthReport {
        let mut targets = self.supervised.clone();
        if let Some(probe) = &self.probe {
            targets.push(probe.clone());
        }
        HealthMonitor::new(targets, &self.settings.monitor).poll()
    }

    /// Engine off, monitor, gateway drain, subsystems in reverse, loops.
    /// A second call returns an empty report.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        if self.shut_down {
            return ShutdownReport::default();
        }
        self.shut_down = true;
        info!("Shutting down");

        // 1. Master switch
        self.controller.set_engine_on(false);

        let mut report = ShutdownReport::default();

        // 2. Health monitor
        if let Some((cancel, handle)) = self.monitor.take() {
            cancel.cancel();
            match timeout(self.settings.stop_timeout, handle).await {
                Ok(Ok(polls)) => report.monitor_polls = polls,
                Ok(Err(e)) => warn!("Health monitor task failed: {}", e),
                Err(_) => warn!("Health monitor did not stop in {:?}", self.settings.stop_timeout),
            }
        }

        // 3. Gateway drain, while the downstream engine is still up
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.close_gateway(self.settings.stop_timeout).await;
        }

        // 4. Subsystems, reverse start order
        let outcome = self.stop_supervised().await;
        report.stopped = outcome.stopped;
        report.failed = outcome.failed;
        report.timed_out = outcome.timed_out;

        // 5. Listener loops
        if let Some(pipeline) = self.pipeline.take() {
            report.pipeline = pipeline.join(self.settings.join_timeout).await;
        }

        info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            timed_out = report.timed_out.len(),
            abandoned = report.pipeline.abandoned.len(),
            "Shutdown complete"
        );
        report
    }

    async fn stop_supervised(&mut self) -> StopOutcome {
        let mut outcome = StopOutcome::default();
        let limit = self.settings.stop_timeout;

        while let Some(subsystem) = self.supervised.pop() {
            let id = subsystem.id().to_string();
            match timeout(limit, subsystem.stop()).await {
                Ok(Ok(())) => {
                    info!(subsystem = %id, "Stopped");
                    outcome.stopped.push(id);
                }
                Ok(Err(e)) => {
                    warn!(subsystem = %id, "Stop failed: {}", e);
                    outcome.failed.push((id, e.to_string()));
                }
                Err(_) => {
                    warn!(subsystem = %id, "Stop timed out after {:?}", limit);
                    outcome.timed_out.push(id);
                }
            }
        }
        outcome
    }
}
