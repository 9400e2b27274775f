use serde_json::{json, Map, Value};

use super::message::{Payload, UnifiedMessage, DEFAULT_ENGINE_SOURCE};
use crate::channels::{CaptureContent, RawCapture};

/// Maps every capture shape onto the canonical message.
///
/// Total: each `CaptureContent` variant has exactly one payload shape, which is
/// the shape its input type derives, so normalization cannot fail.
#[derive(Debug, Clone)]
pub struct Normalizer {
    engine_source: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_SOURCE)
    }
}

impl Normalizer {
    pub fn new(engine_source: impl Into<String>) -> Self {
        Self {
            engine_source: engine_source.into(),
        }
    }

    pub fn engine_source(&self) -> &str {
        &self.engine_source
    }

    pub fn normalize(&self, capture: RawCapture) -> UnifiedMessage {
        let input_type = capture.input_type();
        let payload = match capture.content {
            CaptureContent::Text(text) => Payload::Text(text),
            CaptureContent::Audio { clip, .. } => Payload::Binary(clip),
            CaptureContent::Event { name, attributes } => {
                let mut dict = Map::new();
                dict.insert("name".into(), Value::String(name));
                dict.insert("attributes".into(), Value::Object(attributes));
                Payload::Dict(dict)
            }
            CaptureContent::Signal {
                sensor,
                value,
                unit,
            } => {
                let mut dict = Map::new();
                dict.insert("sensor".into(), Value::String(sensor));
                // Non-finite readings become null.
                dict.insert("value".into(), json!(value));
                dict.insert("unit".into(), unit.map(Value::String).unwrap_or(Value::Null));
                Payload::Dict(dict)
            }
        };

        let mut builder = UnifiedMessage::builder(input_type, payload)
            .engine_source(self.engine_source.clone())
            .timestamp(capture.captured_at)
            .privacy_flag(capture.privacy_flag);
        if let Some(device) = capture.source_device {
            builder = builder.source_device(device);
        }
        if let Some(confidence) = capture.confidence.filter(|c| c.is_finite()) {
            builder = builder.confidence(confidence);
        }
        if let Some(session_id) = capture.session_id {
            builder = builder.session_id(session_id);
        }
        builder.assemble()
    }
}
