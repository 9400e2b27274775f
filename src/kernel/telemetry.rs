//! Pipeline counters.
//!
//! Read-only side channel for the health monitor and operators; nothing in the
//! pipeline branches on these values. Counters only, never payload content.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::message::InputType;

#[derive(Debug, Default)]
struct ChannelCounters {
    captured: AtomicU64,
    capture_errors: AtomicU64,
    forwarded: AtomicU64,
}

/// Shared by every listener loop, the gateway and its dispatcher.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    text: ChannelCounters,
    audio: ChannelCounters,
    event: ChannelCounters,
    signal: ChannelCounters,
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub captured: u64,
    pub capture_errors: u64,
    pub forwarded: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    /// Accepted into the gateway queue.
    pub forwarded: u64,
    /// Handed to the downstream ingress successfully.
    pub delivered: u64,
    /// Rejected because the queue was full.
    pub dropped: u64,
    /// Dispatcher gone or downstream refused.
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub channels: BTreeMap<InputType, ChannelStats>,
    pub gateway: GatewayStats,
}

impl TelemetrySnapshot {
    pub fn channel(&self, kind: InputType) -> ChannelStats {
        self.channels.get(&kind).cloned().unwrap_or_default()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, kind: InputType) -> &ChannelCounters {
        match kind {
            InputType::Text => &self.text,
            InputType::Audio => &self.audio,
            InputType::Event => &self.event,
            InputType::Signal => &self.signal,
        }
    }

    pub fn record_captured(&self, kind: InputType) {
        self.channel(kind).captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_error(&self, kind: InputType) {
        self.channel(kind)
            .capture_errors
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, kind: InputType) {
        self.channel(kind).forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forwarded(&self, kind: InputType) -> u64 {
        self.channel(kind).forwarded.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut snap = TelemetrySnapshot::default();

        for kind in InputType::ALL {
            let c = self.channel(kind);
            let stats = ChannelStats {
                captured: c.captured.load(Ordering::Relaxed),
                capture_errors: c.capture_errors.load(Ordering::Relaxed),
                forwarded: c.forwarded.load(Ordering::Relaxed),
            };
            snap.gateway.forwarded += stats.forwarded;
            snap.channels.insert(kind, stats);
        }

        snap.gateway.delivered = self.delivered.load(Ordering::Relaxed);
        snap.gateway.dropped = self.dropped.load(Ordering::Relaxed);
        snap.gateway.failed = self.failed.load(Ordering::Relaxed);
        snap
    }
}
