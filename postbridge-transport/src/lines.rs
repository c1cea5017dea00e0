use crate::{FrameSource, Transport, TransportError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use postbridge_core::DEFAULT_MAX_FRAME_LEN;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Outbound half of a newline-delimited frame stream (stdio, pipes, sockets).
///
/// Posting never blocks: frames are queued and written by a background task.
#[derive(Debug, Clone)]
pub struct LineTransport {
    tx: mpsc::UnboundedSender<String>,
}

/// Inbound half of a newline-delimited frame stream.
#[derive(Debug)]
pub struct LineSource<R> {
    lines: FramedRead<R, LinesCodec>,
    // FramedRead yields one `None` after a decode error before resuming
    resume_after_error: bool,
}

impl<R: AsyncRead + Send + Unpin> LineSource<R> {
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_len)),
            resume_after_error: false,
        }
    }
}

/// Split a byte stream pair into a bridge transport and frame source.
///
/// Must be called from within a tokio runtime.
pub fn split<R, W>(reader: R, writer: W) -> (LineTransport, LineSource<R>)
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    split_with_max_len(reader, writer, DEFAULT_MAX_FRAME_LEN)
}

pub fn split_with_max_len<R, W>(
    reader: R,
    writer: W,
    max_frame_len: usize,
) -> (LineTransport, LineSource<R>)
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut sink = FramedWrite::new(writer, LinesCodec::new_with_max_length(max_frame_len));

    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(frame).await {
                tracing::warn!(error = %e, "Line transport write failed");
                break;
            }
        }
        tracing::debug!("Line transport writer finished");
    });

    (LineTransport { tx }, LineSource::new(reader, max_frame_len))
}

impl Transport for LineTransport {
    fn post_message(&self, frame: String) -> Result<(), TransportError> {
        if frame.contains('\n') {
            return Err(TransportError::Codec(
                "frame contains a raw newline".to_string(),
            ));
        }
        self.tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[async_trait]
impl<R> FrameSource for LineSource<R>
where
    R: AsyncRead + Send + Unpin,
{
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.lines.next().await {
                None if self.resume_after_error => {
                    self.resume_after_error = false;
                    continue;
                }
                None => return Ok(None),
                Some(Ok(line)) if line.is_empty() => continue,
                Some(Ok(line)) => return Ok(Some(line)),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    self.resume_after_error = true;
                    return Err(TransportError::Codec(
                        "line exceeds maximum frame length".to_string(),
                    ))
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
            }
        }
    }
}
