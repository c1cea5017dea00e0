//! Failure boundary around handler invocation.
//!
//! A handler that returns `Err` or panics must still produce a terminal error
//! ack, and a panic must never unwind into the transport's receive loop.

use postbridge_core::BridgeError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run a handler, converting a panic into [`BridgeError::internal`].
pub fn invoke_guarded<T, F>(method: &str, f: F) -> Result<T, BridgeError>
where
    F: FnOnce() -> Result<T, BridgeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_to_string(payload.as_ref());
            tracing::error!(%method, "Handler panicked: {}", message);
            Err(BridgeError::internal(message))
        }
    }
}

fn panic_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked with unknown payload".to_string()
    }
}
