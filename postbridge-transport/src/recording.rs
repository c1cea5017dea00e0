use crate::{Transport, TransportError};
use postbridge_core::{decode_frame, Frame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Transport that keeps every posted frame in memory.
///
/// Used as the adapter mock in tests: the bridge under test posts into it and
/// assertions inspect what would have gone over the wire.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn frames(&self) -> MutexGuard<'_, Vec<String>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make subsequent posts fail with [`TransportError::ConnectionClosed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.frames().clone()
    }

    /// Posted frames, decoded. Undecodable frames are skipped.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.frames()
            .iter()
            .filter_map(|raw| decode_frame(raw).ok())
            .collect()
    }

    /// Drain and return everything posted so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.frames())
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }
}

impl Transport for RecordingTransport {
    fn post_message(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        tracing::trace!(frame = %frame, "Recorded frame");
        self.frames().push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbridge_core::FrameKind;

    #[test]
    fn test_records_in_order() {
        let transport = RecordingTransport::new();
        assert!(transport.is_empty());
        transport.post_message("req|a|m|[]".into()).unwrap();
        transport.post_message("garbage".into()).unwrap();
        transport.post_message("ack|a|finish|{}".into()).unwrap();

        assert_eq!(transport.len(), 3);
        let frames = transport.sent_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind, FrameKind::Request);
        assert_eq!(frames[1].kind, FrameKind::Ack);

        assert_eq!(transport.take().len(), 3);
        assert!(transport.is_empty());
    }

    #[test]
    fn test_closed_rejects() {
        let transport = RecordingTransport::new();
        transport.close();
        assert!(transport.post_message("evt|a|m|[]".into()).is_err());
        assert!(transport.sent().is_empty());
    }
}
