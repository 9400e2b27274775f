use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::message::InputType;

/// Per-channel enable flags. Also the `[channels]` section of the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFlags {
    pub text: bool,
    pub audio: bool,
    pub events: bool,
    pub signals: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            text: true,
            audio: true,
            events: true,
            signals: true,
        }
    }
}

impl ChannelFlags {
    pub fn get(&self, kind: InputType) -> bool {
        match kind {
            InputType::Text => self.text,
            InputType::Audio => self.audio,
            InputType::Event => self.events,
            InputType::Signal => self.signals,
        }
    }

    pub fn set(&mut self, kind: InputType, enabled: bool) {
        match kind {
            InputType::Text => self.text = enabled,
            InputType::Audio => self.audio = enabled,
            InputType::Event => self.events = enabled,
            InputType::Signal => self.signals = enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub engine_on: bool,
    pub channels: ChannelFlags,
}

/// Master run switch plus one gate per channel.
///
/// Shared through an `Arc` by every listener loop. Loops only read; the
/// supervisor and the admin path write. Flags are plain atomics: a flip becomes
/// visible to a loop at its next cycle boundary.
#[derive(Debug)]
pub struct ChannelController {
    engine_on: AtomicBool,
    text_enabled: AtomicBool,
    audio_enabled: AtomicBool,
    events_enabled: AtomicBool,
    signals_enabled: AtomicBool,
}

impl Default for ChannelController {
    fn default() -> Self {
        Self::with_channels(ChannelFlags::default())
    }
}

impl ChannelController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(flags: ChannelFlags) -> Self {
        Self {
            engine_on: AtomicBool::new(true),
            text_enabled: AtomicBool::new(flags.text),
            audio_enabled: AtomicBool::new(flags.audio),
            events_enabled: AtomicBool::new(flags.events),
            signals_enabled: AtomicBool::new(flags.signals),
        }
    }

    pub fn engine_on(&self) -> bool {
        self.engine_on.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set_engine_on(&self, on: bool) -> bool {
        let prev = self.engine_on.swap(on, Ordering::AcqRel);
        if prev != on {
            info!(engine_on = on, "Master switch flipped");
        }
        prev
    }

    pub fn is_enabled(&self, kind: InputType) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set_enabled(&self, kind: InputType, enabled: bool) -> bool {
        let prev = self.flag(kind).swap(enabled, Ordering::AcqRel);
        if prev != enabled {
            info!(channel = %kind, enabled, "Channel gate flipped");
        }
        prev
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let mut channels = ChannelFlags::default();
        for kind in InputType::ALL {
            channels.set(kind, self.is_enabled(kind));
        }
        ControllerSnapshot {
            engine_on: self.engine_on(),
            channels,
        }
    }

    fn flag(&self, kind: InputType) -> &AtomicBool {
        match kind {
            InputType::Text => &self.text_enabled,
            InputType::Audio => &self.audio_enabled,
            InputType::Event => &self.events_enabled,
            InputType::Signal => &self.signals_enabled,
        }
    }
}
