use tokio::sync::mpsc;
use tracing::debug;

use super::{CaptureContent, ChannelListener, FeedReceiver, RawCapture, FEED_CAPACITY};
use crate::error::CaptureError;
use crate::kernel::message::InputType;

pub const DEFAULT_SIGNAL_DEVICE: &str = "iot_sensor";

/// One numeric sensor sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    pub sensor: String,
    pub value: f64,
    pub unit: Option<String>,
}

impl SignalReading {
    pub fn new(sensor: impl Into<String>, value: f64) -> Self {
        Self {
            sensor: sensor.into(),
            value,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SignalTap {
    tx: mpsc::Sender<SignalReading>,
}

impl SignalTap {
    pub fn emit(&self, reading: SignalReading) -> bool {
        match self.tx.try_send(reading) {
            Ok(()) => true,
            Err(e) => {
                debug!("Signal tap rejected reading: {}", e);
                false
            }
        }
    }
}

pub struct SignalListener {
    name: String,
    source_device: String,
    feed: FeedReceiver<SignalReading>,
}

impl SignalListener {
    pub fn new(source_device: impl Into<String>) -> (Self, SignalTap) {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let listener = Self {
            name: "SignalListener".to_string(),
            source_device: source_device.into(),
            feed: FeedReceiver::new(rx),
        };
        (listener, SignalTap { tx })
    }
}

impl ChannelListener for SignalListener {
    fn kind(&self) -> InputType {
        InputType::Signal
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&mut self) -> Result<Option<RawCapture>, CaptureError> {
        Ok(self.feed.poll()?.map(|reading| {
            RawCapture::new(CaptureContent::Signal {
                sensor: reading.sensor,
                value: reading.value,
                unit: reading.unit,
            })
            .with_device(self.source_device.clone())
        }))
    }
}
