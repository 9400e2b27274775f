//! Channel listeners: one capture source per input kind.
//!
//! Every listener is polled by its own listener loop. `listen()` must return
//! quickly; "nothing right now" is `Ok(None)`, not a wait.

pub mod event;
pub mod signal;
pub mod text;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::CaptureError;
use crate::kernel::message::InputType;

pub use event::{EventListener, EventTap, SystemEvent};
pub use signal::{SignalListener, SignalReading, SignalTap};
pub use text::{TextFeed, TextListener};

/// Queue depth between a producer handle and its listener.
pub const FEED_CAPACITY: usize = 128;

/// A capture source polled by a listener loop.
pub trait ChannelListener: Send {
    fn kind(&self) -> InputType;

    /// Identity used in logs and loop summaries.
    fn name(&self) -> &str;

    fn listen(&mut self) -> Result<Option<RawCapture>, CaptureError>;
}

/// What a listener produced, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureContent {
    Text(String),
    /// A WAV-encoded clip.
    Audio { clip: Vec<u8>, sample_rate: u32 },
    Event {
        name: String,
        attributes: Map<String, Value>,
    },
    Signal {
        sensor: String,
        value: f64,
        unit: Option<String>,
    },
}

impl CaptureContent {
    pub fn input_type(&self) -> InputType {
        match self {
            CaptureContent::Text(_) => InputType::Text,
            CaptureContent::Audio { .. } => InputType::Audio,
            CaptureContent::Event { .. } => InputType::Event,
            CaptureContent::Signal { .. } => InputType::Signal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCapture {
    pub content: CaptureContent,
    pub captured_at: DateTime<Utc>,
    pub source_device: Option<String>,
    pub confidence: Option<f32>,
    pub privacy_flag: bool,
    pub session_id: Option<String>,
}

impl RawCapture {
    /// Stamps the capture with the current time.
    pub fn new(content: CaptureContent) -> Self {
        Self {
            content,
            captured_at: Utc::now(),
            source_device: None,
            confidence: None,
            privacy_flag: false,
            session_id: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(CaptureContent::Text(text.into()))
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.source_device = Some(device.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_privacy(mut self, private: bool) -> Self {
        self.privacy_flag = private;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn input_type(&self) -> InputType {
        self.content.input_type()
    }
}

/// Receiving end of a producer-fed listener.
///
/// Once every producer handle is gone the disconnect is reported a single
/// time; later polls just come back empty so a dead feed does not flood the log.
#[derive(Debug)]
pub(crate) struct FeedReceiver<T> {
    rx: mpsc::Receiver<T>,
    disconnect_reported: bool,
}

impl<T> FeedReceiver<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx,
            disconnect_reported: false,
        }
    }

    pub(crate) fn poll(&mut self) -> Result<Option<T>, CaptureError> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                if self.disconnect_reported {
                    Ok(None)
                } else {
                    self.disconnect_reported = true;
                    Err(CaptureError::Disconnected)
                }
            }
        }
    }
}
