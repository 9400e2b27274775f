use std::path::PathBuf;

use thiserror::Error;

use crate::kernel::message::{InputType, PayloadType};

/// A single listener failed to produce a capture this cycle.
/// Recovered inside the listener loop; never fatal.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source disconnected")]
    Disconnected,

    #[error("audio clip encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("capture device error: {0}")]
    Device(String),
}

/// The gateway could not hand a message to its downstream consumer.
/// Counted by the pipeline metrics, never propagated to a listener loop.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("gateway queue full ({capacity} pending), message dropped")]
    QueueFull { capacity: usize },

    #[error("gateway dispatcher closed")]
    Closed,

    #[error("downstream {id} unavailable: {reason}")]
    Unavailable { id: String, reason: String },
}

/// Failure reported by a supervised subsystem's own start/stop hooks.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SubsystemError {
    message: String,
}

impl SubsystemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("subsystem {id} failed to start: {source}")]
    StartFailed {
        id: String,
        #[source]
        source: SubsystemError,
    },

    #[error("subsystem {id} is declared more than once")]
    DuplicateSubsystem { id: String },

    #[error("subsystem {id} depends on undeclared subsystem {dependency}")]
    UnknownDependency { id: String, dependency: String },

    #[error("dependency cycle between subsystems: {}", .members.join(", "))]
    DependencyCycle { members: Vec<String> },

    #[error("supervisor has already been started")]
    AlreadyStarted,
}

/// Precondition violations when building a message through the factory.
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("{input_type} input carries a {expected} payload, got {actual}")]
    PayloadMismatch {
        input_type: InputType,
        expected: PayloadType,
        actual: PayloadType,
    },

    #[error("confidence must be a finite number, got {0}")]
    InvalidConfidence(f32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum AdminError {
    #[error("empty admin command")]
    Empty,

    #[error("unknown admin command: {0}")]
    Unknown(String),

    #[error("expected on|off, got {0}")]
    BadSwitch(String),
}
