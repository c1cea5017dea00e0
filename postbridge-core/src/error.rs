use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Remote,
    Transport,
    Timeout,
    Canceled,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Remote => "remote",
            ErrorCode::Transport => "transport",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Canceled => "canceled",
            ErrorCode::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// Error surfaced to callers and carried inside `error` acks.
///
/// Handlers return this type; the engine serializes it into the ack's `data`
/// slot and the issuing side reconstructs it when the call rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        BridgeError {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: Value) -> Self {
        BridgeError {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Remote, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Canceled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Rebuild an error from the `data` slot of an `error` ack.
    ///
    /// Peers that only attach a bare message (string or `{message}`) are
    /// mapped to [`ErrorCode::Remote`].
    pub fn from_ack_data(data: Value) -> Self {
        match data {
            Value::String(message) => Self::remote(message),
            Value::Object(ref map) => {
                if let Ok(err) = serde_json::from_value::<BridgeError>(data.clone()) {
                    return err;
                }
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("remote handler failed")
                    .to_string();
                Self::with_data(ErrorCode::Remote, message, data)
            }
            Value::Null => Self::remote("remote handler failed"),
            other => Self::with_data(ErrorCode::Remote, other.to_string(), other),
        }
    }

    /// The value placed in the `data` slot of an `error` ack.
    pub fn to_ack_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::String(self.message.clone()))
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for BridgeError {}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::bad_request(format!("JSON error: {}", err))
    }
}
