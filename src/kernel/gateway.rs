use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::UnifiedMessage;
use super::telemetry::PipelineMetrics;
use crate::error::ForwardError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Receive port of a downstream engine.
///
/// `receive` runs on the gateway's dispatcher task and should return promptly.
pub trait Ingress: Send + Sync {
    fn id(&self) -> &str;

    fn receive(&self, message: UnifiedMessage) -> Result<(), ForwardError>;
}

/// Fire-and-forget front door shared by every listener loop.
///
/// `forward` never waits: messages go into a bounded FIFO drained by a single
/// dispatcher. When the FIFO is full the newest message is dropped and counted.
#[derive(Debug)]
pub struct Gateway {
    tx: mpsc::Sender<UnifiedMessage>,
    capacity: usize,
    downstream: String,
    metrics: Arc<PipelineMetrics>,
}

/// Drains the gateway queue into the downstream ingress.
pub struct GatewayDispatcher {
    rx: mpsc::Receiver<UnifiedMessage>,
    ingress: Arc<dyn Ingress>,
    metrics: Arc<PipelineMetrics>,
}

impl Gateway {
    pub fn new(
        ingress: Arc<dyn Ingress>,
        capacity: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> (Self, GatewayDispatcher) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let gateway = Self {
            tx,
            capacity,
            downstream: ingress.id().to_string(),
            metrics: metrics.clone(),
        };
        let dispatcher = GatewayDispatcher {
            rx,
            ingress,
            metrics,
        };
        (gateway, dispatcher)
    }

    pub fn downstream(&self) -> &str {
        &self.downstream
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue for delivery. Failures are counted and logged, never returned.
    pub fn forward(&self, message: UnifiedMessage) {
        if let Err(e) = self.try_forward(message) {
            warn!(downstream = %self.downstream, "Forward failed: {}", e);
        }
    }

    /// Same as `forward`, but hands the outcome back to the caller.
    pub fn try_forward(&self, message: UnifiedMessage) -> Result<(), ForwardError> {
        let kind = message.input_type();
        match self.tx.try_send(message) {
            Ok(()) => {
                self.metrics.record_forwarded(kind);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_dropped();
                Err(ForwardError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_failed();
                Err(ForwardError::Closed)
            }
        }
    }
}

impl GatewayDispatcher {
    /// Runs until cancelled or until every gateway handle is dropped.
    /// On cancellation, whatever is already queued is still delivered.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(downstream = %self.ingress.id(), "Gateway dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(message) => self.deliver(message),
                    None => break,
                },
            }
        }

        // Close first so late forwards fail fast instead of piling up.
        self.rx.close();
        let mut drained = 0usize;
        while let Ok(message) = self.rx.try_recv() {
            self.deliver(message);
            drained += 1;
        }
        info!(drained, "Gateway dispatcher stopped");
    }

    fn deliver(&self, message: UnifiedMessage) {
        let kind = message.input_type();
        match self.ingress.receive(message) {
            Ok(()) => {
                self.metrics.record_delivered();
                debug!(downstream = %self.ingress.id(), channel = %kind, "Delivered");
            }
            Err(e) => {
                self.metrics.record_failed();
                warn!(downstream = %self.ingress.id(), "Delivery failed: {}", e);
            }
        }
    }
}
