use crate::{FrameSource, Transport, TransportError};
use async_trait::async_trait;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tungstenite::protocol::Message as WsMessage;

/// Outbound half of a WebSocket carrying one frame per text message.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    tx: mpsc::UnboundedSender<String>,
}

/// Inbound half of a WebSocket carrying one frame per text message.
#[derive(Debug)]
pub struct WebSocketSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Split an established WebSocket into a bridge transport and frame source.
///
/// Must be called from within a tokio runtime; the write half is driven by a
/// background task that exits when every transport clone is dropped.
pub fn split<S>(ws: WebSocketStream<S>) -> (WebSocketTransport, WebSocketSource<S>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut sink, stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(WsMessage::text(frame)).await {
                tracing::warn!(error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    (WebSocketTransport { tx }, WebSocketSource { stream })
}

/// Connect to a WebSocket endpoint and split it.
pub async fn connect(
    url: &str,
) -> Result<(WebSocketTransport, WebSocketSource<MaybeTlsStream<TcpStream>>), TransportError> {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Protocol(format!("Failed to connect: {}", e)))?;
    tracing::debug!(%url, "WebSocket connected");
    Ok(split(ws))
}

impl Transport for WebSocketTransport {
    fn post_message(&self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[async_trait]
impl<S> FrameSource for WebSocketSource<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(WsMessage::Binary(data))) => {
                    return String::from_utf8(data.to_vec())
                        .map(Some)
                        .map_err(|e| TransportError::Codec(format!("Non UTF-8 frame: {}", e)));
                }
                Some(Ok(WsMessage::Close(_))) => return Ok(None),
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Protocol(e.to_string())),
            }
        }
    }
}
