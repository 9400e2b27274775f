//! The input pipeline: message model, gating, normalization and forwarding.

pub mod admin;
pub mod controller;
pub mod gateway;
pub mod listener;
pub mod message;
pub mod normalizer;
pub mod pipeline;
pub mod telemetry;

pub use admin::{AdminCommand, AdminEffect};
pub use controller::{ChannelController, ChannelFlags, ControllerSnapshot};
pub use gateway::{Gateway, GatewayDispatcher, Ingress};
pub use listener::{ListenerLoop, LoopState, LoopSummary, LoopTiming};
pub use message::{InputType, MessageBuilder, Payload, PayloadType, UnifiedMessage};
pub use normalizer::Normalizer;
pub use pipeline::{Pipeline, PipelineExit, PipelineProbe, PipelineSettings, RunningPipeline};
pub use telemetry::{PipelineMetrics, TelemetrySnapshot};
