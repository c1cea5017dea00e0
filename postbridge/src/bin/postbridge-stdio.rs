//! postbridge over stdin/stdout
//!
//! Serves a small set of demo handlers as newline-delimited frames, which
//! makes it easy to drive a bridge from another process or by hand:
//!
//! ```text
//! $ postbridge-stdio
//! req|1|echo|["hi"]
//! ack|1|finish|{"actionId":"echo","complete":true,"data":"hi"}
//! ```
//!
//! Logs go to stderr and to daily files under the directory given as the
//! first argument (default `logs`).

use anyhow::Result;
use postbridge::{init_logging, pump, BridgeConfig, BridgeEngine, BridgeError, Namespace};
use postbridge_transport::lines;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn number(args: &[Value], index: usize) -> Result<f64, BridgeError> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| BridgeError::bad_request(format!("argument {} must be a number", index)))
}

fn register_handlers(engine: &BridgeEngine) {
    engine.register("echo", |args| Ok(args.into_iter().next().unwrap_or_default()));
    engine.register("ping", |_| Ok(json!("pong")));

    engine.register_namespace(
        "math",
        Namespace::new()
            .method("add", |args| Ok(json!(number(&args, 0)? + number(&args, 1)?)))
            .method("multiply", |args| Ok(json!(number(&args, 0)? * number(&args, 1)?)))
            .method("divide", |args| {
                let divisor = number(&args, 1)?;
                if divisor == 0.0 {
                    return Err(BridgeError::bad_request("division by zero"));
                }
                Ok(json!(number(&args, 0)? / divisor))
            }),
    );

    // Reports every step from a background task, then completes with 0
    engine.register_async("countdown", |args, reporter| {
        let from = args.first().and_then(Value::as_u64).unwrap_or(3);
        tokio::spawn(async move {
            for n in (1..=from).rev() {
                reporter.progress(json!(n));
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            reporter.complete(json!(0));
        });
        Ok(None)
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::args().nth(1).unwrap_or_else(|| "logs".to_string());
    let _logging = init_logging(log_dir, "postbridge-stdio")?;

    let (transport, mut source) = lines::split(tokio::io::stdin(), tokio::io::stdout());
    let engine = BridgeEngine::with_config(Arc::new(transport), BridgeConfig::named("stdio"));
    register_handlers(&engine);

    info!("Serving bridge on stdin/stdout");
    let stats = pump(&mut source, &engine).await?;
    engine.shutdown();
    info!(?stats, "Input closed, shutting down");
    Ok(())
}
