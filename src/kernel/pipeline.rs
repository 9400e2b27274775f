use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::controller::ChannelController;
use super::gateway::{Gateway, GatewayDispatcher, Ingress, DEFAULT_QUEUE_CAPACITY};
use super::listener::{ListenerLoop, LoopSummary, LoopTiming};
use super::message::DEFAULT_ENGINE_SOURCE;
use super::normalizer::Normalizer;
use super::telemetry::PipelineMetrics;
use crate::channels::ChannelListener;
use crate::error::SubsystemError;
use crate::supervisor::subsystem::{StatusReport, Subsystem};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub timing: LoopTiming,
    pub queue_capacity: usize,
    pub engine_source: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            timing: LoopTiming::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            engine_source: DEFAULT_ENGINE_SOURCE.to_string(),
        }
    }
}

/// The input pipeline before launch: listeners plus their shared stages.
pub struct Pipeline {
    controller: Arc<ChannelController>,
    normalizer: Arc<Normalizer>,
    gateway: Arc<Gateway>,
    dispatcher: GatewayDispatcher,
    metrics: Arc<PipelineMetrics>,
    listeners: Vec<Box<dyn ChannelListener>>,
    timing: LoopTiming,
}

impl Pipeline {
    pub fn new(
        controller: Arc<ChannelController>,
        ingress: Arc<dyn Ingress>,
        settings: &PipelineSettings,
    ) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let (gateway, dispatcher) = Gateway::new(ingress, settings.queue_capacity, metrics.clone());
        Self {
            controller,
            normalizer: Arc::new(Normalizer::new(settings.engine_source.clone())),
            gateway: Arc::new(gateway),
            dispatcher,
            metrics,
            listeners: Vec::new(),
            timing: settings.timing,
        }
    }

    pub fn with_listener(mut self, listener: Box<dyn ChannelListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn ChannelListener>) {
        self.listeners.push(listener);
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    pub fn gateway(&self) -> Arc<Gateway> {
        self.gateway.clone()
    }

    /// Health view of the pipeline itself, for the monitor.
    pub fn probe(&self) -> Arc<PipelineProbe> {
        Arc::new(PipelineProbe {
            id: self.normalizer.engine_source().to_string(),
            controller: self.controller.clone(),
            metrics: self.metrics.clone(),
        })
    }

    /// Spawns the dispatcher and one task per listener.
    pub fn launch(self) -> RunningPipeline {
        let dispatcher_cancel = CancellationToken::new();
        let dispatcher = tokio::spawn(self.dispatcher.run(dispatcher_cancel.clone()));

        let mut loops = Vec::with_capacity(self.listeners.len());
        for listener in self.listeners {
            let name = listener.name().to_string();
            let task = ListenerLoop::new(
                listener,
                self.normalizer.clone(),
                self.gateway.clone(),
                self.controller.clone(),
                self.metrics.clone(),
                self.timing,
            );
            loops.push((name, tokio::spawn(task.run())));
        }
        info!(listeners = loops.len(), "Input pipeline launched");

        RunningPipeline {
            loops,
            dispatcher: Some(dispatcher),
            dispatcher_cancel,
            metrics: self.metrics,
        }
    }
}

/// Outcome of joining the pipeline's tasks.
#[derive(Debug, Clone, Default)]
pub struct PipelineExit {
    pub summaries: Vec<LoopSummary>,
    /// Loops that did not exit in time. Left running detached, not killed.
    pub abandoned: Vec<String>,
}

pub struct RunningPipeline {
    loops: Vec<(String, JoinHandle<LoopSummary>)>,
    dispatcher: Option<JoinHandle<()>>,
    dispatcher_cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
}

impl RunningPipeline {
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Stops the dispatcher after it has delivered everything already queued.
    /// Later forwards fail as `Closed`. Calling it again does nothing.
    pub async fn close_gateway(&mut self, limit: Duration) {
        let Some(dispatcher) = self.dispatcher.take() else {
            return;
        };
        self.dispatcher_cancel.cancel();
        if timeout(limit, dispatcher).await.is_err() {
            warn!("Gateway dispatcher did not drain in {:?}, abandoning", limit);
        }
    }

    /// Waits for the loops (which exit once `engine_on` is false), then closes
    /// the gateway if still open. Every wait shares one deadline of `limit`.
    pub async fn join(mut self, limit: Duration) -> PipelineExit {
        let deadline = Instant::now() + limit;
        let mut exit = PipelineExit::default();

        for (name, handle) in std::mem::take(&mut self.loops) {
            match timeout_at(deadline, handle).await {
                Ok(Ok(summary)) => exit.summaries.push(summary),
                Ok(Err(e)) => {
                    warn!(listener = %name, "Listener loop ended abnormally: {}", e);
                    exit.abandoned.push(name);
                }
                Err(_) => {
                    // Dropping the handle detaches the task.
                    warn!(listener = %name, "Listener loop did not exit in {:?}, abandoning", limit);
                    exit.abandoned.push(name);
                }
            }
        }

        self.close_gateway(deadline.saturating_duration_since(Instant::now()))
            .await;

        exit
    }
}

/// Reports the pipeline to the health monitor: alive while the master switch
/// is on, with controller flags and gateway counters as status.
pub struct PipelineProbe {
    id: String,
    controller: Arc<ChannelController>,
    metrics: Arc<PipelineMetrics>,
}

#[async_trait]
impl Subsystem for PipelineProbe {
    fn id(&self) -> &str {
        &self.id
    }

    // Watch-only: the supervisor owns the master switch, so these do nothing.
    async fn start(&self) -> Result<(), SubsystemError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), SubsystemError> {
        Ok(())
    }

    fn is_running(&self) -> Option<bool> {
        Some(self.controller.engine_on())
    }

    fn status(&self) -> Option<StatusReport> {
        let flags = self.controller.snapshot();
        let snap = self.metrics.snapshot();
        let status = if flags.engine_on { "running" } else { "stopped" };

        let mut report = StatusReport::new(status)
            .with_detail("forwarded", snap.gateway.forwarded)
            .with_detail("delivered", snap.gateway.delivered)
            .with_detail("dropped", snap.gateway.dropped)
            .with_detail("failed", snap.gateway.failed);
        for (kind, stats) in &snap.channels {
            let enabled = flags.channels.get(*kind);
            report = report.with_detail(
                kind.as_str(),
                serde_json::json!({
                    "enabled": enabled,
                    "captured": stats.captured,
                    "capture_errors": stats.capture_errors,
                }),
            );
        }
        Some(report)
    }
}
