//! Harness configuration, loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::listener::DEFAULT_AUDIO_DEVICE;
use crate::engines::{standard_roster, EngineSpec};
use crate::error::ConfigError;
use crate::kernel::controller::ChannelFlags;
use crate::kernel::gateway::DEFAULT_QUEUE_CAPACITY;
use crate::kernel::listener::{LoopTiming, DEFAULT_CYCLE_DELAY_MS, DEFAULT_IDLE_BACKOFF_MS};
use crate::kernel::message::DEFAULT_ENGINE_SOURCE;
use crate::kernel::pipeline::PipelineSettings;
use crate::monitor::monitor::{DEFAULT_BOARD_PERIOD_SECS, DEFAULT_PERIOD_SECS};
use crate::monitor::MonitorConfig;
use crate::supervisor::{SupervisorSettings, DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_STOP_TIMEOUT_MS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub pipeline: PipelineConfig,
    pub channels: ChannelFlags,
    pub audio: AudioConfig,
    pub monitor: MonitorSection,
    pub engines: Vec<EngineSpec>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            channels: ChannelFlags::default(),
            audio: AudioConfig::default(),
            monitor: MonitorSection::default(),
            engines: standard_roster(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub idle_backoff_ms: u64,
    pub cycle_delay_ms: u64,
    pub join_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub gateway_queue: usize,
    pub engine_source: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
            cycle_delay_ms: DEFAULT_CYCLE_DELAY_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            gateway_queue: DEFAULT_QUEUE_CAPACITY,
            engine_source: DEFAULT_ENGINE_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub source_device: String,
    /// Length of each captured clip.
    pub window_secs: f32,
    pub sample_rate: u32,
    /// Drop windows with no detected speech.
    pub voice_gate: bool,
    /// Ring buffer depth between the device callback and the listener.
    pub buffer_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source_device: DEFAULT_AUDIO_DEVICE.to_string(),
            window_secs: 2.0,
            sample_rate: 16000,
            voice_gate: true,
            buffer_secs: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub period_secs: u64,
    pub board_period_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_PERIOD_SECS,
            board_period_secs: DEFAULT_BOARD_PERIOD_SECS,
        }
    }
}

impl HarnessConfig {
    /// Reads and validates `path`, or returns the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HarnessConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.gateway_queue == 0 {
            return Err(ConfigError::Invalid("pipeline.gateway_queue must be at least 1".into()));
        }
        if p.idle_backoff_ms == 0 || p.cycle_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.idle_backoff_ms and pipeline.cycle_delay_ms must be positive".into(),
            ));
        }
        if p.engine_source.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.engine_source must not be empty".into()));
        }

        let a = &self.audio;
        if !(a.window_secs.is_finite() && a.window_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "audio.window_secs must be positive, got {}",
                a.window_secs
            )));
        }
        if !(a.buffer_secs.is_finite() && a.buffer_secs >= a.window_secs) {
            return Err(ConfigError::Invalid(format!(
                "audio.buffer_secs ({}) must hold at least one window ({})",
                a.buffer_secs, a.window_secs
            )));
        }
        if a.sample_rate == 0 {
            return Err(ConfigError::Invalid("audio.sample_rate must be positive".into()));
        }

        if self.monitor.period_secs == 0 || self.monitor.board_period_secs == 0 {
            return Err(ConfigError::Invalid("monitor periods must be positive".into()));
        }

        if let Some(engine) = self.engines.iter().find(|e| e.id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "engine entry with label {:?} has an empty id",
                engine.label
            )));
        }
        Ok(())
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming {
            idle_backoff: Duration::from_millis(self.pipeline.idle_backoff_ms),
            cycle_delay: Duration::from_millis(self.pipeline.cycle_delay_ms),
        }
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.join_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.stop_timeout_ms)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            period: Duration::from_secs(self.monitor.period_secs),
            board_period: Duration::from_secs(self.monitor.board_period_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            timing: self.loop_timing(),
            queue_capacity: self.pipeline.gateway_queue,
            engine_source: self.pipeline.engine_source.clone(),
        }
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            stop_timeout: self.stop_timeout(),
            join_timeout: self.join_timeout(),
            monitor: self.monitor_config(),
        }
    }
}
