use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::SubsystemError;

/// Status snapshot a subsystem may expose to the health monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub details: BTreeMap<String, Value>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A dependent engine the supervisor starts, stops and watches.
///
/// `is_running` and `status` are optional: `None` means "not reported" and is
/// never treated as a failure.
#[async_trait]
pub trait Subsystem: Send + Sync {
    fn id(&self) -> &str;

    /// Ids of subsystems that must be started before this one.
    fn depends_on(&self) -> &[String] {
        &[]
    }

    async fn start(&self) -> Result<(), SubsystemError>;

    async fn stop(&self) -> Result<(), SubsystemError>;

    fn is_running(&self) -> Option<bool> {
        None
    }

    fn status(&self) -> Option<StatusReport> {
        None
    }
}
