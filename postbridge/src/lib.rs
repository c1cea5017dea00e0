//! Bidirectional RPC over a single ordered string channel.
//!
//! Each side of the channel runs a [`BridgeEngine`]. Either side may call
//! methods the other registered; replies travel back as `ack` frames tied to
//! the call by correlation id, optionally preceded by progress acks.
//!
//! ```no_run
//! use postbridge::{spawn_pump, BridgeEngine};
//! use postbridge_transport::ChannelTransport;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), postbridge::BridgeError> {
//! let (host, page) = ChannelTransport::pair();
//!
//! let host_bridge = Arc::new(BridgeEngine::new(Arc::new(host.transport)));
//! let page_bridge = Arc::new(BridgeEngine::new(Arc::new(page.transport)));
//! page_bridge.register("echo", |args| Ok(args.into_iter().next().unwrap_or_default()));
//!
//! spawn_pump(host.receiver, host_bridge.clone());
//! spawn_pump(page.receiver, page_bridge.clone());
//!
//! let reply = host_bridge.call("echo", vec![json!("hi")]).await?;
//! assert_eq!(reply, json!("hi"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod guard;
pub mod logging;
pub mod pump;
mod timeout;

pub use config::BridgeConfig;
pub use engine::{BridgeEngine, PendingReply, ProgressCall, RecvOutcome};
pub use logging::{init_logging, init_logging_with, init_test_logging, LogOptions, LoggingGuard};
pub use pump::{pump, spawn_pump, PumpStats};

pub use postbridge_core::{
    AckOutcome, BridgeError, CorrelationId, ErrorCode, Frame, FrameKind, Handler, IdAllocator,
    Namespace, ProgressReporter, SequentialAllocator, UuidAllocator,
};
pub use postbridge_transport::{FrameSource, Transport, TransportError};
