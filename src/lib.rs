pub mod audio;
pub mod channels;
pub mod config;
pub mod engines;
pub mod error;
pub mod kernel;
pub mod monitor;
pub mod supervisor;

// Re-export the pieces a harness binary wires together
pub use config::HarnessConfig;
pub use kernel::controller::ChannelController;
pub use kernel::message::{InputType, Payload, PayloadType, UnifiedMessage};
pub use kernel::pipeline::{Pipeline, PipelineSettings};
pub use supervisor::{Supervisor, SupervisorSettings};
