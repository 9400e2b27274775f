use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ForwardError, SubsystemError};
use crate::kernel::gateway::Ingress;
use crate::kernel::message::UnifiedMessage;
use crate::supervisor::subsystem::{StatusReport, Subsystem};

/// Messages kept by default for inspection.
pub const DEFAULT_RETAIN: usize = 64;

/// Downstream port that keeps the newest `retain` messages and counts the rest.
/// `retain == 0` discards everything after counting.
#[derive(Debug)]
pub struct StubIngress {
    id: String,
    retain: usize,
    received: Mutex<VecDeque<UnifiedMessage>>,
    count: AtomicU64,
}

impl StubIngress {
    pub fn new(id: impl Into<String>, retain: usize) -> Self {
        Self {
            id: id.into(),
            retain,
            received: Mutex::new(VecDeque::new()),
            count: AtomicU64::new(0),
        }
    }

    pub fn discarding(id: impl Into<String>) -> Self {
        Self::new(id, 0)
    }

    /// Total accepted, retained or not.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Retained messages, oldest first.
    pub fn received(&self) -> Vec<UnifiedMessage> {
        match self.received.lock() {
            Ok(history) => history.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn accept(&self, message: UnifiedMessage) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if self.retain == 0 {
            return;
        }
        let mut history = match self.received.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if history.len() == self.retain {
            history.pop_front();
        }
        history.push_back(message);
    }
}

impl Ingress for StubIngress {
    fn id(&self) -> &str {
        &self.id
    }

    fn receive(&self, message: UnifiedMessage) -> Result<(), ForwardError> {
        self.accept(message);
        Ok(())
    }
}

/// Stand-in for a dependent engine: start/stop flip a flag, liveness reads it,
/// and messages are only accepted while running.
#[derive(Debug)]
pub struct StubEngine {
    label: String,
    depends_on: Vec<String>,
    running: AtomicBool,
    ingress: StubIngress,
}

impl StubEngine {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            depends_on: Vec::new(),
            running: AtomicBool::new(false),
            ingress: StubIngress::new(id, DEFAULT_RETAIN),
        }
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    pub fn with_dependencies(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.depends_on.extend(ids);
        self
    }

    pub fn with_retain(mut self, retain: usize) -> Self {
        self.ingress.retain = retain;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn received(&self) -> Vec<UnifiedMessage> {
        self.ingress.received()
    }

    pub fn received_count(&self) -> u64 {
        self.ingress.count()
    }
}

#[async_trait]
impl Subsystem for StubEngine {
    fn id(&self) -> &str {
        self.ingress.id()
    }

    fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    async fn start(&self) -> Result<(), SubsystemError> {
        self.running.store(true, Ordering::Release);
        info!(engine = %self.ingress.id(), label = %self.label, "Engine started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), SubsystemError> {
        self.running.store(false, Ordering::Release);
        info!(engine = %self.ingress.id(), label = %self.label, "Engine stopped");
        Ok(())
    }

    fn is_running(&self) -> Option<bool> {
        Some(self.running.load(Ordering::Acquire))
    }

    fn status(&self) -> Option<StatusReport> {
        let running = self.running.load(Ordering::Acquire);
        Some(
            StatusReport::new(if running { "running" } else { "stopped" })
                .with_detail("label", self.label.clone())
                .with_detail("received", self.ingress.count()),
        )
    }
}

impl Ingress for StubEngine {
    fn id(&self) -> &str {
        self.ingress.id()
    }

    fn receive(&self, message: UnifiedMessage) -> Result<(), ForwardError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(ForwardError::Unavailable {
                id: self.ingress.id().to_string(),
                reason: "engine not running".to_string(),
            });
        }
        debug!(engine = %self.ingress.id(), channel = %message.input_type(), "Received");
        self.ingress.accept(message);
        Ok(())
    }
}
