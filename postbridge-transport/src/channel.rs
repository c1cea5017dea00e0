use crate::{FrameSource, Transport, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sending side of an in-process frame channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

/// Receiving side of an in-process frame channel.
#[derive(Debug)]
pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

/// One side of a linked pair: posts reach the other side's receiver.
#[derive(Debug)]
pub struct ChannelEndpoint {
    pub transport: ChannelTransport,
    pub receiver: ChannelReceiver,
}

/// A single one-way frame channel.
pub fn channel() -> (ChannelTransport, ChannelReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelTransport { tx }, ChannelReceiver { rx })
}

impl ChannelTransport {
    /// Two cross-wired endpoints, e.g. host shell and embedded page.
    pub fn pair() -> (ChannelEndpoint, ChannelEndpoint) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (
            ChannelEndpoint {
                transport: a_tx,
                receiver: a_rx,
            },
            ChannelEndpoint {
                transport: b_tx,
                receiver: b_rx,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for ChannelTransport {
    fn post_message(&self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl ChannelReceiver {
    /// Non-blocking poll, used by tests that drive delivery by hand.
    pub fn try_next(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[async_trait]
impl FrameSource for ChannelReceiver {
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}
