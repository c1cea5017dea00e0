use crate::{BridgeError, CorrelationId};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Receiving half of a pending call's continuation.
pub type CallReceiver = oneshot::Receiver<Result<Value, BridgeError>>;

/// Sending half of a pending call's continuation.
pub type CallSender = oneshot::Sender<Result<Value, BridgeError>>;

/// A locally issued call waiting for its terminal ack.
#[derive(Debug)]
pub struct PendingCall {
    /// Method name, kept for diagnostics
    pub method: String,
    /// Set once the first ack for this id arrives
    pub acknowledged: bool,
    /// Data of the most recent progress ack
    pub latest: Option<Value>,
    continuation: CallSender,
    progress: Option<mpsc::UnboundedSender<Value>>,
}

impl PendingCall {
    pub fn new(method: impl Into<String>, continuation: CallSender) -> Self {
        Self {
            method: method.into(),
            acknowledged: false,
            latest: None,
            continuation,
            progress: None,
        }
    }

    /// Attach an observer that receives the data of every ack for this call.
    pub fn with_progress(mut self, observer: mpsc::UnboundedSender<Value>) -> Self {
        self.progress = Some(observer);
        self
    }

    fn observe(&self, data: &Value) {
        if let Some(observer) = &self.progress {
            // Observer may have been dropped by the caller
            let _ = observer.send(data.clone());
        }
    }

    fn settle(self, outcome: Result<Value, BridgeError>) {
        if let Ok(data) = &outcome {
            self.observe(data);
        }
        if self.continuation.send(outcome).is_err() {
            tracing::trace!(method = %self.method, "Caller dropped before settlement");
        }
    }
}

/// Outstanding locally issued calls keyed by correlation id.
#[derive(Debug, Default)]
pub struct PendingCallTable {
    calls: DashMap<CorrelationId, PendingCall>,
}

impl PendingCallTable {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
        }
    }

    /// Insert a call. An existing entry under the same id is replaced and its
    /// continuation dropped, so its caller observes cancellation.
    pub fn register(&self, correlation_id: CorrelationId, call: PendingCall) {
        if let Some(previous) = self.calls.insert(correlation_id.clone(), call) {
            tracing::warn!(
                %correlation_id,
                method = %previous.method,
                "Correlation id collision; previous pending call replaced"
            );
        }
    }

    /// Record a non-terminal ack. Returns `false` when no call is pending.
    pub fn resolve_progress(&self, correlation_id: &CorrelationId, data: Value) -> bool {
        match self.calls.get_mut(correlation_id) {
            Some(mut call) => {
                call.acknowledged = true;
                call.observe(&data);
                call.latest = Some(data);
                true
            }
            None => false,
        }
    }

    /// Settle a call successfully and remove it.
    pub fn resolve_complete(&self, correlation_id: &CorrelationId, data: Value) -> bool {
        match self.calls.remove(correlation_id) {
            Some((_, call)) => {
                call.settle(Ok(data));
                true
            }
            None => false,
        }
    }

    /// Settle a call with an error and remove it.
    pub fn reject_complete(&self, correlation_id: &CorrelationId, error: BridgeError) -> bool {
        match self.calls.remove(correlation_id) {
            Some((_, call)) => {
                call.settle(Err(error));
                true
            }
            None => false,
        }
    }

    pub fn has(&self, correlation_id: &CorrelationId) -> bool {
        self.calls.contains_key(correlation_id)
    }

    pub fn is_acknowledged(&self, correlation_id: &CorrelationId) -> bool {
        self.calls
            .get(correlation_id)
            .map(|call| call.acknowledged)
            .unwrap_or(false)
    }

    pub fn latest(&self, correlation_id: &CorrelationId) -> Option<Value> {
        self.calls
            .get(correlation_id)
            .and_then(|call| call.latest.clone())
    }

    /// Drop a call without settling it.
    pub fn forget(&self, correlation_id: &CorrelationId) -> bool {
        self.calls.remove(correlation_id).is_some()
    }

    /// Drop every pending call. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let count = self.calls.len();
        self.calls.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn stats(&self) -> PendingCallStats {
        let acknowledged = self.calls.iter().filter(|call| call.acknowledged).count();
        PendingCallStats {
            pending_calls: self.calls.len(),
            acknowledged_calls: acknowledged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCallStats {
    pub pending_calls: usize,
    pub acknowledged_calls: usize,
}
