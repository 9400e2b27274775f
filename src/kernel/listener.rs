use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::controller::ChannelController;
use super::gateway::Gateway;
use super::message::InputType;
use super::normalizer::Normalizer;
use super::telemetry::PipelineMetrics;
use crate::channels::ChannelListener;

pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 100;
pub const DEFAULT_CYCLE_DELAY_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Gate open, polling the listener.
    Running,
    /// Channel gate closed; backing off and re-checking.
    Idle,
    /// Master switch off; the loop has exited.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub idle_backoff: Duration,
    pub cycle_delay: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(DEFAULT_IDLE_BACKOFF_MS),
            cycle_delay: Duration::from_millis(DEFAULT_CYCLE_DELAY_MS),
        }
    }
}

impl LoopTiming {
    /// Upper bound on how long a loop can take to notice the master switch.
    pub fn max_cycle(&self) -> Duration {
        self.idle_backoff.max(self.cycle_delay)
    }
}

/// What a loop did over its lifetime. Returned when it stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub listener: String,
    pub kind: InputType,
    /// Accepted by the gateway queue.
    pub forwarded: u64,
    /// Captured but refused by the gateway (queue full or closed).
    pub forward_failures: u64,
    pub capture_errors: u64,
}

/// Per-channel task: gate check → capture → normalize → forward → yield.
pub struct ListenerLoop {
    listener: Box<dyn ChannelListener>,
    normalizer: Arc<Normalizer>,
    gateway: Arc<Gateway>,
    controller: Arc<ChannelController>,
    metrics: Arc<PipelineMetrics>,
    timing: LoopTiming,
    state: LoopState,
    forwarded: u64,
    forward_failures: u64,
    capture_errors: u64,
}

impl ListenerLoop {
    pub fn new(
        listener: Box<dyn ChannelListener>,
        normalizer: Arc<Normalizer>,
        gateway: Arc<Gateway>,
        controller: Arc<ChannelController>,
        metrics: Arc<PipelineMetrics>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            listener,
            normalizer,
            gateway,
            controller,
            metrics,
            timing,
            state: LoopState::Running,
            forwarded: 0,
            forward_failures: 0,
            capture_errors: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn kind(&self) -> InputType {
        self.listener.kind()
    }

    pub fn name(&self) -> &str {
        self.listener.name()
    }

    /// One cycle without the trailing delay. Returns the state the cycle ended in.
    ///
    /// Once `Stopped` the loop is finished; further calls do nothing.
    pub fn step(&mut self) -> LoopState {
        if self.state == LoopState::Stopped {
            return LoopState::Stopped;
        }

        // 1. Master switch
        if !self.controller.engine_on() {
            self.transition(LoopState::Stopped);
            return self.state;
        }

        // 2. Channel gate
        let kind = self.listener.kind();
        if !self.controller.is_enabled(kind) {
            self.transition(LoopState::Idle);
            return self.state;
        }
        self.transition(LoopState::Running);

        // 3. Capture → Normalize → Forward
        match self.listener.listen() {
            Ok(Some(capture)) => {
                self.metrics.record_captured(kind);
                let message = self.normalizer.normalize(capture);
                match self.gateway.try_forward(message) {
                    Ok(()) => self.forwarded += 1,
                    Err(e) => {
                        self.forward_failures += 1;
                        warn!(listener = %self.listener.name(), channel = %kind, "Forward failed: {}", e);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Treated as "nothing this cycle".
                self.capture_errors += 1;
                self.metrics.record_capture_error(kind);
                warn!(listener = %self.listener.name(), channel = %kind, "Capture failed: {}", e);
            }
        }

        self.state
    }

    /// Drive the loop until the master switch goes off.
    pub async fn run(mut self) -> LoopSummary {
        info!(listener = %self.listener.name(), channel = %self.listener.kind(), "Listener loop started");

        loop {
            match self.step() {
                LoopState::Stopped => break,
                LoopState::Idle => sleep(self.timing.idle_backoff).await,
                LoopState::Running => sleep(self.timing.cycle_delay).await,
            }
        }

        info!(
            listener = %self.listener.name(),
            forwarded = self.forwarded,
            forward_failures = self.forward_failures,
            capture_errors = self.capture_errors,
            "Listener loop stopped"
        );
        self.summary()
    }

    pub fn summary(&self) -> LoopSummary {
        LoopSummary {
            listener: self.listener.name().to_string(),
            kind: self.listener.kind(),
            forwarded: self.forwarded,
            forward_failures: self.forward_failures,
            capture_errors: self.capture_errors,
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(listener = %self.listener.name(), from = ?self.state, to = ?next, "Loop state");
            self.state = next;
        }
    }
}
