//! Drives [`BridgeEngine::recv`] from an inbound [`FrameSource`].

use crate::engine::{BridgeEngine, RecvOutcome};
use postbridge_transport::{FrameSource, TransportError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-outcome frame counts for one pump run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub frames: u64,
    pub dispatched: u64,
    pub unhandled: u64,
    pub settled: u64,
    pub progress: u64,
    pub stale: u64,
    pub malformed: u64,
    /// Recoverable read errors, e.g. an over-long line
    pub read_errors: u64,
}

impl PumpStats {
    fn record(&mut self, outcome: RecvOutcome) {
        self.frames += 1;
        match outcome {
            RecvOutcome::Dispatched => self.dispatched += 1,
            RecvOutcome::Unhandled => self.unhandled += 1,
            RecvOutcome::Settled => self.settled += 1,
            RecvOutcome::Progress => self.progress += 1,
            RecvOutcome::Stale => self.stale += 1,
            RecvOutcome::Malformed => self.malformed += 1,
        }
    }
}

/// Feed every frame from `source` into `engine`, in order, until the source
/// ends. Non-fatal read errors are logged and skipped.
pub async fn pump<S>(source: &mut S, engine: &BridgeEngine) -> Result<PumpStats, TransportError>
where
    S: FrameSource + ?Sized,
{
    let mut stats = PumpStats::default();
    loop {
        match source.next_frame().await {
            Ok(Some(raw)) => stats.record(engine.recv(&raw)),
            Ok(None) => {
                debug!(bridge = %engine.name(), frames = stats.frames, "Frame source ended");
                return Ok(stats);
            }
            Err(e) if !e.is_fatal() => {
                warn!(bridge = %engine.name(), error = %e, "Skipping unreadable frame");
                stats.read_errors += 1;
            }
            Err(e) => {
                warn!(bridge = %engine.name(), error = %e, "Frame source failed");
                return Err(e);
            }
        }
    }
}

/// Run [`pump`] on a background task. When the source ends or fails the
/// engine is shut down, so callers still awaiting replies see cancellation.
pub fn spawn_pump<S>(
    mut source: S,
    engine: Arc<BridgeEngine>,
) -> JoinHandle<Result<PumpStats, TransportError>>
where
    S: FrameSource + 'static,
{
    tokio::spawn(async move {
        let result = pump(&mut source, &engine).await;
        engine.shutdown();
        result
    })
}
