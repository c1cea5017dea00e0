//! The bridge engine: issues calls, registers handlers and routes every
//! inbound frame either to the pending-call table (acks for calls we issued)
//! or to the dispatch table (invocations the peer issued to us).
//!
//! The engine is transport-agnostic. Outbound frames go through an injected
//! [`Transport`]; inbound frames are handed to [`BridgeEngine::recv`] one at a
//! time, usually by [`crate::pump`].

use crate::config::BridgeConfig;
use crate::guard::invoke_guarded;
use postbridge_core::{
    AckOutcome, AckPayload, BridgeError, CallReceiver, CorrelationId, DispatchTable, Frame,
    FrameCodec, FrameKind, Handler, IdAllocator, Namespace, PendingCall, PendingCallTable,
    ProgressReporter, UuidAllocator,
};
use postbridge_transport::Transport;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// What [`BridgeEngine::recv`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// Invocation routed to a local handler
    Dispatched,
    /// Invocation for a method nobody registered; nothing was sent back
    Unhandled,
    /// Terminal ack settled a pending call
    Settled,
    /// Non-terminal ack recorded against a pending call
    Progress,
    /// Ack for an id with no pending call (late, duplicate or for an event)
    Stale,
    /// Frame could not be decoded
    Malformed,
}

/// Future returned by [`BridgeEngine::call`], resolving with the terminal ack.
#[derive(Debug)]
#[must_use = "a reply does nothing unless awaited"]
pub struct PendingReply {
    correlation_id: CorrelationId,
    state: ReplyState,
}

#[derive(Debug)]
enum ReplyState {
    Waiting(CallReceiver),
    Failed(Option<BridgeError>),
}

impl PendingReply {
    fn waiting(correlation_id: CorrelationId, rx: CallReceiver) -> Self {
        Self {
            correlation_id,
            state: ReplyState::Waiting(rx),
        }
    }

    fn failed(correlation_id: CorrelationId, error: BridgeError) -> Self {
        Self {
            correlation_id,
            state: ReplyState::Failed(Some(error)),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

impl Future for PendingReply {
    type Output = Result<Value, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            ReplyState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::canceled(format!(
                    "call {} dropped before settlement",
                    this.correlation_id
                )))),
                Poll::Pending => Poll::Pending,
            },
            ReplyState::Failed(error) => Poll::Ready(Err(error
                .take()
                .unwrap_or_else(|| BridgeError::internal("reply polled after completion")))),
        }
    }
}

/// A call whose intermediate acks are observable.
#[derive(Debug)]
pub struct ProgressCall {
    /// Resolves with the terminal ack's data
    pub reply: PendingReply,
    /// Data of every ack in arrival order, terminal value last
    pub updates: mpsc::UnboundedReceiver<Value>,
}

/// One end of a bridge.
#[derive(Debug)]
pub struct BridgeEngine {
    config: BridgeConfig,
    transport: Arc<dyn Transport>,
    codec: FrameCodec,
    ids: Arc<dyn IdAllocator>,
    pending: Arc<PendingCallTable>,
    dispatch: Arc<DispatchTable>,
}

impl BridgeEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, BridgeConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: BridgeConfig) -> Self {
        let codec = FrameCodec::with_max_frame_len(config.max_frame_len);
        Self {
            config,
            transport,
            codec,
            ids: Arc::new(UuidAllocator),
            pending: Arc::new(PendingCallTable::new()),
            dispatch: Arc::new(DispatchTable::new()),
        }
    }

    /// Replace the correlation id source. Ids must be unique for the
    /// lifetime of the bridge.
    pub fn with_id_allocator(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn pending(&self) -> &PendingCallTable {
        &self.pending
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    // --- outbound ---

    /// Invoke `method` on the peer.
    ///
    /// The request frame is sent before this returns; the returned future
    /// only waits for the terminal ack. There is no built-in timeout, see
    /// [`BridgeEngine::call_with_timeout`].
    pub fn call(&self, method: impl Into<String>, args: Vec<Value>) -> PendingReply {
        self.start_call(method.into(), args, None)
    }

    /// Like [`call`](Self::call), deserializing the result.
    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<T, BridgeError> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Invoke `method` and observe every ack, not just the terminal one.
    pub fn call_with_progress(&self, method: impl Into<String>, args: Vec<Value>) -> ProgressCall {
        let (tx, updates) = mpsc::unbounded_channel();
        let reply = self.start_call(method.into(), args, Some(tx));
        ProgressCall { reply, updates }
    }

    /// Fire-and-forget: send an `evt` frame with no pending entry.
    pub fn notify(
        &self,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<CorrelationId, BridgeError> {
        let correlation_id = self.ids.allocate();
        let frame = Frame::event(correlation_id.clone(), method, args);
        self.send(&frame)?;
        Ok(correlation_id)
    }

    fn start_call(
        &self,
        method: String,
        args: Vec<Value>,
        observer: Option<mpsc::UnboundedSender<Value>>,
    ) -> PendingReply {
        let correlation_id = self.ids.allocate();
        let frame = Frame::request(correlation_id.clone(), method.as_str(), args);
        let raw = match self.codec.encode(&frame) {
            Ok(raw) => raw,
            Err(e) => return PendingReply::failed(correlation_id, e.into()),
        };

        let (tx, rx) = oneshot::channel();
        let mut call = PendingCall::new(method.as_str(), tx);
        if let Some(observer) = observer {
            call = call.with_progress(observer);
        }
        // Registered before posting: a synchronous transport may deliver the
        // ack before post_message returns.
        self.pending.register(correlation_id.clone(), call);

        debug!(bridge = %self.config.name, %correlation_id, %method, "Issuing call");
        trace!(frame = %raw, "Sending frame");
        if let Err(e) = self.transport.post_message(raw) {
            self.pending.forget(&correlation_id);
            warn!(%correlation_id, %method, error = %e, "Failed to send request");
            return PendingReply::failed(correlation_id, e.into());
        }

        PendingReply::waiting(correlation_id, rx)
    }

    fn send(&self, frame: &Frame) -> Result<(), BridgeError> {
        post_frame(self.transport.as_ref(), &self.codec, frame)
    }

    // --- registration ---

    /// Register a one-shot handler.
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, BridgeError> + Send + Sync + 'static,
    {
        self.dispatch.register_sync(name, f);
    }

    /// Register a progress-capable handler. The reporter it receives may be
    /// used zero or more times, synchronously or later from another task.
    pub fn register_async<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>, ProgressReporter) -> Result<Option<Value>, BridgeError>
            + Send
            + Sync
            + 'static,
    {
        self.dispatch.register_progressive(name, f);
    }

    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) {
        self.dispatch.register_handler(name, handler);
    }

    /// Register a group of handlers reachable as `<name>.<method>`.
    pub fn register_namespace(&self, name: impl Into<String>, namespace: Namespace) {
        self.dispatch.register_namespace(name, namespace);
    }

    /// Remove a handler or namespace. Returns whether anything was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let handler = self.dispatch.remove_handler(name).is_some();
        let namespace = self.dispatch.remove_namespace(name);
        handler || namespace
    }

    // --- inbound ---

    /// Single inbound entry point. Never fails and never panics on bad input;
    /// the outcome is reported for diagnostics.
    pub fn recv(&self, raw: &str) -> RecvOutcome {
        let span = tracing::debug_span!("recv", bridge = %self.config.name);
        let _enter = span.enter();

        trace!(frame = %raw, "Received frame");
        let frame = match self.codec.decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return RecvOutcome::Malformed;
            }
        };

        match frame.kind {
            FrameKind::Request | FrameKind::Event => self.handle_invocation(frame),
            FrameKind::Ack => self.handle_ack(frame),
        }
    }

    fn handle_invocation(&self, frame: Frame) -> RecvOutcome {
        let Some(handler) = self.dispatch.resolve(&frame.method) else {
            debug!(method = %frame.method, correlation_id = %frame.correlation_id, "No handler; frame dropped");
            return RecvOutcome::Unhandled;
        };

        let args = frame.args();
        let Frame {
            correlation_id,
            method,
            ..
        } = frame;
        debug!(%method, %correlation_id, kind = ?handler.kind(), "Dispatching");

        match handler {
            Handler::OneShot(f) => {
                let ack = match invoke_guarded(&method, || f(args)) {
                    Ok(data) => Frame::finish(correlation_id, method.as_str(), data),
                    Err(error) => {
                        debug!(%method, %error, "Handler failed");
                        Frame::failure(correlation_id, method.as_str(), &error)
                    }
                };
                // Send failures are logged in post_frame; the peer simply
                // never hears back, as with any lost frame.
                let _ = self.send(&ack);
            }
            Handler::Progressive(f) => {
                let reporter = self.reporter(correlation_id, method.clone());
                match invoke_guarded(&method, || f(args, reporter.clone())) {
                    Ok(Some(data)) => {
                        if !reporter.complete(data) {
                            trace!(%method, "Return value ignored; reporter already completed");
                        }
                    }
                    Ok(None) => {}
                    Err(error) => {
                        if !reporter.fail(&error) {
                            debug!(%method, %error, "Handler failed after completing; error dropped");
                        }
                    }
                }
            }
        }

        RecvOutcome::Dispatched
    }

    /// Bind a reporter to this engine's transport, acking under `action_id`.
    fn reporter(&self, correlation_id: CorrelationId, action_id: String) -> ProgressReporter {
        let transport = Arc::clone(&self.transport);
        let codec = self.codec.clone();
        let reply_to = correlation_id.clone();
        ProgressReporter::new(correlation_id, move |outcome, data, complete| {
            let ack = Frame::ack(
                reply_to.clone(),
                outcome,
                AckPayload {
                    data,
                    action_id: action_id.clone(),
                    complete,
                },
            );
            let _ = post_frame(transport.as_ref(), &codec, &ack);
        })
    }

    fn handle_ack(&self, frame: Frame) -> RecvOutcome {
        let Some(outcome) = frame.ack_outcome() else {
            warn!(tag = %frame.method, "Dropping ack with unknown outcome");
            return RecvOutcome::Malformed;
        };
        let payload = match frame.ack_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Dropping ack with unreadable payload");
                return RecvOutcome::Malformed;
            }
        };

        let correlation_id = &frame.correlation_id;
        // `complete` alone decides settlement; a non-terminal error ack is a
        // progress update like any other.
        let (found, result) = match (payload.complete, outcome) {
            (false, _) => (
                self.pending.resolve_progress(correlation_id, payload.data),
                RecvOutcome::Progress,
            ),
            (true, AckOutcome::Finish) => (
                self.pending.resolve_complete(correlation_id, payload.data),
                RecvOutcome::Settled,
            ),
            (true, AckOutcome::Error) => (
                self.pending
                    .reject_complete(correlation_id, BridgeError::from_ack_data(payload.data)),
                RecvOutcome::Settled,
            ),
        };

        if found {
            trace!(%correlation_id, action = %payload.action_id, ?result, "Ack applied");
            result
        } else {
            trace!(%correlation_id, "Stale ack dropped");
            RecvOutcome::Stale
        }
    }

    /// Drop every pending call; their callers observe `ErrorCode::Canceled`.
    pub fn shutdown(&self) -> usize {
        let dropped = self.pending.clear();
        if dropped > 0 {
            debug!(bridge = %self.config.name, dropped, "Pending calls canceled");
        }
        dropped
    }
}

fn post_frame(
    transport: &dyn Transport,
    codec: &FrameCodec,
    frame: &Frame,
) -> Result<(), BridgeError> {
    let raw = codec.encode(frame).map_err(|e| {
        warn!(error = %e, "Failed to encode outbound frame");
        BridgeError::from(e)
    })?;
    trace!(frame = %raw, "Sending frame");
    transport.post_message(raw).map_err(|e| {
        warn!(error = %e, correlation_id = %frame.correlation_id, "Failed to send frame");
        BridgeError::from(e)
    })
}
