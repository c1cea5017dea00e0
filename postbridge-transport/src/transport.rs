use async_trait::async_trait;
use postbridge_core::BridgeError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the channel is unusable after this error. Codec errors only
    /// affect the offending frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Codec(_))
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        BridgeError::transport(err.to_string())
    }
}

/// Outbound half of a duplex string channel (`postMessage`).
///
/// Implementations must not block and must not call back into the bridge
/// while holding internal locks; a re-entrant delivery is allowed.
pub trait Transport: Send + Sync + fmt::Debug {
    fn post_message(&self, frame: String) -> Result<(), TransportError>;
}

/// Inbound half of a duplex string channel.
#[async_trait]
pub trait FrameSource: Send {
    /// Next raw frame, `Ok(None)` once the peer has gone away.
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError>;
}
