use tokio::sync::mpsc;
use tracing::debug;

use super::{ChannelListener, FeedReceiver, RawCapture, FEED_CAPACITY};
use crate::error::CaptureError;
use crate::kernel::message::InputType;

pub const DEFAULT_TEXT_DEVICE: &str = "pc";

/// Producer side of the text channel (console reader, tests).
#[derive(Debug, Clone)]
pub struct TextFeed {
    tx: mpsc::Sender<String>,
}

impl TextFeed {
    /// Queues a line without waiting. Returns false if it was not accepted.
    pub fn push(&self, line: impl Into<String>) -> bool {
        match self.tx.try_send(line.into()) {
            Ok(()) => true,
            Err(e) => {
                debug!("Text feed rejected line: {}", e);
                false
            }
        }
    }
}

pub struct TextListener {
    name: String,
    source_device: String,
    feed: FeedReceiver<String>,
}

impl TextListener {
    pub fn new(source_device: impl Into<String>) -> (Self, TextFeed) {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let listener = Self {
            name: "TextListener".to_string(),
            source_device: source_device.into(),
            feed: FeedReceiver::new(rx),
        };
        (listener, TextFeed { tx })
    }
}

impl ChannelListener for TextListener {
    fn kind(&self) -> InputType {
        InputType::Text
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&mut self) -> Result<Option<RawCapture>, CaptureError> {
        // Skip blank lines within the same poll; still non-blocking.
        while let Some(line) = self.feed.poll()? {
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(
                RawCapture::text(line).with_device(self.source_device.clone()),
            ));
        }
        Ok(None)
    }
}
