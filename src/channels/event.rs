use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::{CaptureContent, ChannelListener, FeedReceiver, RawCapture, FEED_CAPACITY};
use crate::error::CaptureError;
use crate::kernel::message::InputType;

pub const DEFAULT_EVENT_DEVICE: &str = "system_events";

/// A named system event with free-form attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEvent {
    pub name: String,
    pub attributes: Map<String, Value>,
}

impl SystemEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Cloneable handle for anything that wants to raise events into the pipeline.
#[derive(Debug, Clone)]
pub struct EventTap {
    tx: mpsc::Sender<SystemEvent>,
}

impl EventTap {
    pub fn emit(&self, event: SystemEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("Event tap rejected event: {}", e);
                false
            }
        }
    }
}

pub struct EventListener {
    name: String,
    source_device: String,
    feed: FeedReceiver<SystemEvent>,
}

impl EventListener {
    pub fn new(source_device: impl Into<String>) -> (Self, EventTap) {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let listener = Self {
            name: "EventListener".to_string(),
            source_device: source_device.into(),
            feed: FeedReceiver::new(rx),
        };
        (listener, EventTap { tx })
    }
}

impl ChannelListener for EventListener {
    fn kind(&self) -> InputType {
        InputType::Event
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&mut self) -> Result<Option<RawCapture>, CaptureError> {
        Ok(self.feed.poll()?.map(|event| {
            RawCapture::new(CaptureContent::Event {
                name: event.name,
                attributes: event.attributes,
            })
            .with_device(self.source_device.clone())
        }))
    }
}
