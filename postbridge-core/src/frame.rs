use crate::error::BridgeError;
use crate::ids::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The three frame types carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    #[serde(rename = "req")]
    Request,
    #[serde(rename = "evt")]
    Event,
    #[serde(rename = "ack")]
    Ack,
}

impl FrameKind {
    pub fn tag(&self) -> &'static str {
        match self {
            FrameKind::Request => "req",
            FrameKind::Event => "evt",
            FrameKind::Ack => "ack",
        }
    }

    pub fn is_invocation(&self) -> bool {
        matches!(self, FrameKind::Request | FrameKind::Event)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FrameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "req" => Ok(FrameKind::Request),
            "evt" => Ok(FrameKind::Event),
            "ack" => Ok(FrameKind::Ack),
            other => Err(other.to_string()),
        }
    }
}

/// Outcome tag stored in the method slot of an ack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    Finish,
    Error,
}

impl AckOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            AckOutcome::Finish => "finish",
            AckOutcome::Error => "error",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "finish" => Some(AckOutcome::Finish),
            "error" => Some(AckOutcome::Error),
            _ => None,
        }
    }
}

/// Structured payload of an ack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    #[serde(default)]
    pub data: Value,
    /// Method name of the invocation being acknowledged.
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub complete: bool,
}

/// One wire unit: `<type>|<correlationId>|<method>|<jsonPayload>`.
///
/// For `req`/`evt` frames `method` is the business method and `payload` the
/// JSON array of arguments. For `ack` frames `method` holds the outcome tag
/// and `payload` an [`AckPayload`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub correlation_id: CorrelationId,
    pub method: String,
    pub payload: Value,
}

impl Frame {
    pub fn new(
        kind: FrameKind,
        correlation_id: CorrelationId,
        method: impl Into<String>,
        payload: Value,
    ) -> Self {
        Frame {
            kind,
            correlation_id,
            method: method.into(),
            payload,
        }
    }

    pub fn request(correlation_id: CorrelationId, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(FrameKind::Request, correlation_id, method, Value::Array(args))
    }

    pub fn event(correlation_id: CorrelationId, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(FrameKind::Event, correlation_id, method, Value::Array(args))
    }

    pub fn ack(correlation_id: CorrelationId, outcome: AckOutcome, payload: AckPayload) -> Self {
        let payload = serde_json::to_value(&payload).unwrap_or(Value::Null);
        Self::new(FrameKind::Ack, correlation_id, outcome.tag(), payload)
    }

    /// Terminal `finish` ack carrying a handler's return value.
    pub fn finish(correlation_id: CorrelationId, action_id: impl Into<String>, data: Value) -> Self {
        Self::ack(
            correlation_id,
            AckOutcome::Finish,
            AckPayload {
                data,
                action_id: action_id.into(),
                complete: true,
            },
        )
    }

    /// Terminal `error` ack carrying a handler failure.
    pub fn failure(
        correlation_id: CorrelationId,
        action_id: impl Into<String>,
        error: &BridgeError,
    ) -> Self {
        Self::ack(
            correlation_id,
            AckOutcome::Error,
            AckPayload {
                data: error.to_ack_data(),
                action_id: action_id.into(),
                complete: true,
            },
        )
    }

    /// Arguments of an invocation frame. A non-array payload is treated as a
    /// single argument, `null` as none.
    pub fn args(&self) -> Vec<Value> {
        match &self.payload {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }

    pub fn ack_outcome(&self) -> Option<AckOutcome> {
        match self.kind {
            FrameKind::Ack => AckOutcome::from_tag(&self.method),
            _ => None,
        }
    }

    pub fn ack_payload(&self) -> Result<AckPayload, BridgeError> {
        Ok(AckPayload::deserialize(&self.payload)?)
    }
}
