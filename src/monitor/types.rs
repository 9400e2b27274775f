use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::supervisor::subsystem::StatusReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Running,
    NotRunning,
    /// The subsystem exposes no liveness predicate.
    NotReported,
}

impl Liveness {
    pub fn from_probe(probe: Option<bool>) -> Self {
        match probe {
            Some(true) => Liveness::Running,
            Some(false) => Liveness::NotRunning,
            None => Liveness::NotReported,
        }
    }

    /// Status board wording.
    pub fn label(&self) -> &'static str {
        match self {
            Liveness::Running => "running",
            Liveness::NotRunning => "NOT RUNNING",
            Liveness::NotReported => "not reported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemHealth {
    pub id: String,
    pub liveness: Liveness,
    pub status: Option<StatusReport>,
}

/// A supervised subsystem whose liveness predicate returned false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemUnhealthy {
    pub id: String,
}

/// One polling pass over every supervised subsystem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub poll: u64,
    pub checked_at: DateTime<Utc>,
    pub subsystems: Vec<SubsystemHealth>,
    pub issues: Vec<SubsystemUnhealthy>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn unhealthy_ids(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.id.as_str()).collect()
    }

    pub fn subsystem(&self, id: &str) -> Option<&SubsystemHealth> {
        self.subsystems.iter().find(|s| s.id == id)
    }
}
