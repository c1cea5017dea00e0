pub mod channel;
pub mod lines;
pub mod recording;
pub mod transport;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use channel::{channel, ChannelEndpoint, ChannelReceiver, ChannelTransport};
pub use lines::{LineSource, LineTransport};
pub use recording::RecordingTransport;
pub use transport::{FrameSource, Transport, TransportError};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketSource, WebSocketTransport};
