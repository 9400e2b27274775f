pub mod monitor;
pub mod types;

pub use monitor::{HealthMonitor, MonitorConfig};
pub use types::{HealthReport, Liveness, SubsystemHealth, SubsystemUnhealthy};
