use crate::engine::BridgeEngine;
use postbridge_core::BridgeError;
use serde_json::Value;
use std::time::Duration;

impl BridgeEngine {
    /// [`call`](BridgeEngine::call) bounded by `limit`.
    ///
    /// On expiry the pending entry is forgotten, so a late ack is treated as
    /// stale, and the call fails with `ErrorCode::Timeout`.
    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        args: Vec<Value>,
        limit: Duration,
    ) -> Result<Value, BridgeError> {
        let method = method.into();
        let reply = self.call(method.as_str(), args);
        let correlation_id = reply.correlation_id().clone();

        match tokio::time::timeout(limit, reply).await {
            Ok(result) => result,
            Err(_) => {
                self.pending().forget(&correlation_id);
                tracing::debug!(%correlation_id, %method, ?limit, "Call timed out");
                Err(BridgeError::timeout(format!(
                    "{} did not complete within {:?}",
                    method, limit
                )))
            }
        }
    }

    /// Call bounded by the configured `default_timeout`, unbounded if unset.
    pub async fn call_with_default_timeout(
        &self,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Value, BridgeError> {
        match self.config().default_timeout {
            Some(limit) => self.call_with_timeout(method, args, limit).await,
            None => self.call(method, args).await,
        }
    }
}
