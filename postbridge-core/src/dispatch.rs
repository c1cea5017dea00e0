//! Method-name resolution for inbound invocations.
//!
//! Handlers come in two explicit kinds chosen at registration time:
//! [`Handler::OneShot`] returns a single result, [`Handler::Progressive`]
//! additionally receives a [`ProgressReporter`] it may call any number of
//! times before (or instead of) returning.
//!
//! Lookup tries the literal method name first, then exactly one level of
//! namespace fallback: `"room.setScenePath"` resolves to the `setScenePath`
//! entry of the namespace registered as `"room"`.

use crate::frame::AckOutcome;
use crate::{BridgeError, CorrelationId};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type OneShotFn = dyn Fn(Vec<Value>) -> Result<Value, BridgeError> + Send + Sync;

pub type ProgressiveFn =
    dyn Fn(Vec<Value>, ProgressReporter) -> Result<Option<Value>, BridgeError> + Send + Sync;

/// Sink the engine binds a reporter to: `(outcome, data, complete)`.
pub type AckEmitter = dyn Fn(AckOutcome, Value, bool) + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    OneShot,
    Progressive,
}

/// A registered method implementation.
#[derive(Clone)]
pub enum Handler {
    OneShot(Arc<OneShotFn>),
    /// Returning `Ok(Some(v))` asks the engine to send the terminal ack with
    /// `v`; `Ok(None)` leaves completion to the reporter.
    Progressive(Arc<ProgressiveFn>),
}

impl Handler {
    pub fn one_shot<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, BridgeError> + Send + Sync + 'static,
    {
        Handler::OneShot(Arc::new(f))
    }

    pub fn progressive<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>, ProgressReporter) -> Result<Option<Value>, BridgeError>
            + Send
            + Sync
            + 'static,
    {
        Handler::Progressive(Arc::new(f))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::OneShot(_) => HandlerKind::OneShot,
            Handler::Progressive(_) => HandlerKind::Progressive,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// The trailing `(data, complete)` callback handed to progressive handlers.
///
/// Clones share completion state: once any clone sends a terminal ack,
/// every further send on any clone is dropped.
#[derive(Clone)]
pub struct ProgressReporter {
    correlation_id: CorrelationId,
    emit: Arc<AckEmitter>,
    completed: Arc<AtomicBool>,
}

impl ProgressReporter {
    pub fn new<F>(correlation_id: CorrelationId, emit: F) -> Self
    where
        F: Fn(AckOutcome, Value, bool) + Send + Sync + 'static,
    {
        Self {
            correlation_id,
            emit: Arc::new(emit),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Send an ack. Returns `false` if the call already completed.
    pub fn send(&self, data: Value, complete: bool) -> bool {
        self.emit_ack(AckOutcome::Finish, data, complete)
    }

    pub fn progress(&self, data: Value) -> bool {
        self.send(data, false)
    }

    pub fn complete(&self, data: Value) -> bool {
        self.send(data, true)
    }

    /// Complete the call with an error ack.
    pub fn fail(&self, error: &BridgeError) -> bool {
        self.emit_ack(AckOutcome::Error, error.to_ack_data(), true)
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn emit_ack(&self, outcome: AckOutcome, data: Value, complete: bool) -> bool {
        let allowed = if complete {
            self.completed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        } else {
            !self.is_complete()
        };

        if !allowed {
            tracing::trace!(
                correlation_id = %self.correlation_id,
                "Ack after completion dropped"
            );
            return false;
        }

        (self.emit)(outcome, data, complete);
        true
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("correlation_id", &self.correlation_id)
            .field("completed", &self.is_complete())
            .finish()
    }
}

/// A group of handlers reachable as `<namespace>.<name>`.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    methods: HashMap<String, Handler>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, BridgeError> + Send + Sync + 'static,
    {
        self.insert(name, Handler::one_shot(f));
        self
    }

    pub fn progressive<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, ProgressReporter) -> Result<Option<Value>, BridgeError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, Handler::progressive(f));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Handler) -> Option<Handler> {
        self.methods.insert(name.into(), handler)
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.methods.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Maps inbound method names to local handlers.
#[derive(Debug, Default)]
pub struct DispatchTable {
    handlers: DashMap<String, Handler>,
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sync<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, BridgeError> + Send + Sync + 'static,
    {
        self.register_handler(name, Handler::one_shot(f));
    }

    pub fn register_progressive<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>, ProgressReporter) -> Result<Option<Value>, BridgeError>
            + Send
            + Sync
            + 'static,
    {
        self.register_handler(name, Handler::progressive(f));
    }

    /// Install a handler, replacing any previous one under the same name.
    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        tracing::debug!(method = %name, kind = ?handler.kind(), "Registering handler");
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(method = %name, "Replaced existing handler");
        }
    }

    /// Install a namespace, replacing (not merging) any previous one.
    pub fn register_namespace(&self, name: impl Into<String>, namespace: Namespace) {
        let name = name.into();
        tracing::debug!(namespace = %name, methods = namespace.len(), "Registering namespace");
        self.namespaces.insert(name, Arc::new(namespace));
    }

    pub fn remove_handler(&self, name: &str) -> Option<Handler> {
        self.handlers.remove(name).map(|(_, handler)| handler)
    }

    pub fn remove_namespace(&self, name: &str) -> bool {
        self.namespaces.remove(name).is_some()
    }

    /// Resolve a method: exact name, then one level of namespace fallback.
    pub fn resolve(&self, method: &str) -> Option<Handler> {
        if let Some(handler) = self.handlers.get(method) {
            return Some(handler.value().clone());
        }

        let (prefix, suffix) = method.rsplit_once('.')?;
        let namespace = self.namespaces.get(prefix)?;
        namespace.get(suffix).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.resolve(method).is_some()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }
}
