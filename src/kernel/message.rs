use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AdminError, MessageError};

pub const DEFAULT_ENGINE_SOURCE: &str = "ENGINE_001";
pub const UNKNOWN_DEVICE: &str = "unknown";
pub const DEFAULT_CONFIDENCE: f32 = 1.0;

/// The four fixed input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Audio,
    Event,
    Signal,
}

impl InputType {
    pub const ALL: [InputType; 4] = [
        InputType::Text,
        InputType::Audio,
        InputType::Event,
        InputType::Signal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Audio => "audio",
            InputType::Event => "event",
            InputType::Signal => "signal",
        }
    }

    /// Payload representation is a function of the input type, never a free choice.
    pub fn payload_type(self) -> PayloadType {
        match self {
            InputType::Audio => PayloadType::Binary,
            InputType::Event | InputType::Signal => PayloadType::Dict,
            InputType::Text => PayloadType::String,
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = AdminError;

    // Accepts the plural channel names used by the controller flags too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(InputType::Text),
            "audio" => Ok(InputType::Audio),
            "event" | "events" => Ok(InputType::Event),
            "signal" | "signals" => Ok(InputType::Signal),
            other => Err(AdminError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    String,
    Binary,
    Dict,
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PayloadType::String => "string",
            PayloadType::Binary => "binary",
            PayloadType::Dict => "dict",
        };
        f.write_str(s)
    }
}

/// Opaque message content. The variant always agrees with `PayloadType`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
    Dict(Map<String, Value>),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Text(_) => PayloadType::String,
            Payload::Binary(_) => PayloadType::Binary,
            Payload::Dict(_) => PayloadType::Dict,
        }
    }
}

/// Canonical message shared by every downstream engine.
///
/// Built once per capture and immutable afterwards: fields are private and only
/// readable through accessors. Handing a message to the gateway moves it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedMessage {
    engine_source: String,
    input_type: InputType,
    raw_payload: Payload,
    payload_type: PayloadType,
    timestamp: DateTime<Utc>,
    source_device: String,
    confidence: f32,
    privacy_flag: bool,
    session_id: String,
}

impl UnifiedMessage {
    /// Convenience factory: default engine source, derived payload type,
    /// fresh session id and capture-time timestamp.
    pub fn create(
        input_type: InputType,
        raw_payload: Payload,
        source_device: impl Into<String>,
    ) -> Result<Self, MessageError> {
        Self::builder(input_type, raw_payload)
            .source_device(source_device)
            .build()
    }

    pub fn builder(input_type: InputType, raw_payload: Payload) -> MessageBuilder {
        MessageBuilder {
            input_type,
            raw_payload,
            engine_source: None,
            timestamp: None,
            source_device: None,
            confidence: None,
            privacy_flag: false,
            session_id: None,
        }
    }

    pub fn engine_source(&self) -> &str {
        &self.engine_source
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn raw_payload(&self) -> &Payload {
        &self.raw_payload
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_device(&self) -> &str {
        &self.source_device
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn privacy_flag(&self) -> bool {
        self.privacy_flag
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Consumes the message, returning its payload.
    pub fn into_payload(self) -> Payload {
        self.raw_payload
    }
}

impl fmt::Display for UnifiedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UnifiedMessage(engine_source={}, input_type={}, source_device={}, timestamp={}, \
             session_id={}, confidence={}, privacy_flag={}, payload_type={}, raw_payload=",
            self.engine_source,
            self.input_type,
            self.source_device,
            self.timestamp.to_rfc3339(),
            self.session_id,
            self.confidence,
            self.privacy_flag,
            self.payload_type,
        )?;
        match &self.raw_payload {
            // Audio never leaks into logs.
            Payload::Binary(_) => f.write_str("<binary>")?,
            Payload::Text(text) => f.write_str(text)?,
            Payload::Dict(map) => write!(f, "{}", Value::Object(map.clone()))?,
        }
        f.write_str(")")
    }
}

/// Builder for messages with explicit optional attributes.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    input_type: InputType,
    raw_payload: Payload,
    engine_source: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    source_device: Option<String>,
    confidence: Option<f32>,
    privacy_flag: bool,
    session_id: Option<String>,
}

impl MessageBuilder {
    pub fn engine_source(mut self, engine_source: impl Into<String>) -> Self {
        self.engine_source = Some(engine_source.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn source_device(mut self, source_device: impl Into<String>) -> Self {
        self.source_device = Some(source_device.into());
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn privacy_flag(mut self, privacy_flag: bool) -> Self {
        self.privacy_flag = privacy_flag;
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Validates the payload shape and confidence, then fills defaults.
    pub fn build(self) -> Result<UnifiedMessage, MessageError> {
        let expected = self.input_type.payload_type();
        let actual = self.raw_payload.payload_type();
        if expected != actual {
            return Err(MessageError::PayloadMismatch {
                input_type: self.input_type,
                expected,
                actual,
            });
        }
        if let Some(c) = self.confidence {
            if !c.is_finite() {
                return Err(MessageError::InvalidConfidence(c));
            }
        }
        Ok(self.assemble())
    }

    /// Infallible path for callers that already guarantee a matching payload
    /// and a finite confidence (the normalizer).
    pub(crate) fn assemble(self) -> UnifiedMessage {
        let session_id = self
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        UnifiedMessage {
            engine_source: self
                .engine_source
                .unwrap_or_else(|| DEFAULT_ENGINE_SOURCE.to_string()),
            payload_type: self.input_type.payload_type(),
            input_type: self.input_type,
            raw_payload: self.raw_payload,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source_device: self
                .source_device
                .unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
            confidence: self
                .confidence
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(DEFAULT_CONFIDENCE),
            privacy_flag: self.privacy_flag,
            session_id,
        }
    }
}
