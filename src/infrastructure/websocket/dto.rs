use crate::domain::errors::{NetworkError, ValidationError};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames the client sends to the stream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Subscribe { symbol: String },
    Unsubscribe { symbol: String },
    Ping,
}

impl ControlMessage {
    pub fn to_json(&self) -> String {
        // a unit or string-only enum always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// `type` field of an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[display(fmt = "candle")]
    Candle,
    #[display(fmt = "tick")]
    Tick,
    #[display(fmt = "price")]
    Price,
    #[display(fmt = "volume")]
    Volume,
    #[display(fmt = "trade")]
    Trade,
    #[display(fmt = "ping")]
    Ping,
    #[display(fmt = "pong")]
    Pong,
    #[serde(other)]
    #[display(fmt = "unknown")]
    Unknown,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default)]
    symbol: Option<String>,
}

/// A decoded frame. The raw value is kept for the candle and tick parsers.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub kind: MessageKind,
    pub symbol: Option<String>,
    pub raw: Value,
}

impl StreamMessage {
    pub fn decode(text: &str) -> Result<Self, NetworkError> {
        let raw: Value = serde_json::from_str(text).map_err(|e| NetworkError::Decode(e.to_string()))?;
        Self::from_value(raw).map_err(|e| NetworkError::Decode(e.to_string()))
    }

    pub fn from_value(raw: Value) -> Result<Self, ValidationError> {
        let envelope: Envelope =
            Envelope::deserialize(&raw).map_err(|e| ValidationError::Message(e.to_string()))?;
        Ok(Self { kind: envelope.kind, symbol: envelope.symbol, raw })
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.kind, MessageKind::Ping | MessageKind::Pong)
    }

    /// Frames without a symbol belong to no subscription.
    pub fn is_for(&self, symbol: &str) -> bool {
        self.symbol.as_deref() == Some(symbol)
    }
}
