//! Bridges talking over byte streams and WebSockets.

use postbridge::{spawn_pump, BridgeConfig, BridgeEngine, ErrorCode};
use postbridge_transport::lines;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_bridges_over_line_stream() {
    let (near, far) = tokio::io::duplex(1024);
    let (near_read, near_write) = tokio::io::split(near);
    let (far_read, far_write) = tokio::io::split(far);

    let (host_tx, host_rx) = lines::split(near_read, near_write);
    let (page_tx, page_rx) = lines::split(far_read, far_write);

    let host = Arc::new(BridgeEngine::with_config(Arc::new(host_tx), BridgeConfig::named("host")));
    let page = Arc::new(BridgeEngine::with_config(Arc::new(page_tx), BridgeConfig::named("page")));
    spawn_pump(host_rx, host.clone());
    spawn_pump(page_rx, page.clone());

    page.register("echo", |args| Ok(args.into_iter().next().unwrap_or_default()));

    // Payload with delimiters and newlines survives framing
    let tricky = json!({ "text": "a|b\nc", "list": [1, 2, 3] });
    assert_eq!(host.call("echo", vec![tricky.clone()]).await.unwrap(), tricky);

    // Nobody answers an unknown method; teardown cancels the wait
    let unanswered = host.call("missing.method", vec![]);
    assert!(host.pending().has(unanswered.correlation_id()));
    assert_eq!(host.shutdown(), 1);
    assert_eq!(unanswered.await.unwrap_err().code, ErrorCode::Canceled);
}

#[cfg(feature = "websocket")]
#[tokio::test]
async fn test_bridges_over_websocket() {
    use postbridge_transport::websocket;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::WebSocketStream;

    let (a, b) = tokio::io::duplex(4096);
    let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;

    let (client_tx, client_rx) = websocket::split(client);
    let (server_tx, server_rx) = websocket::split(server);

    let page = Arc::new(BridgeEngine::new(Arc::new(client_tx)));
    let host = Arc::new(BridgeEngine::new(Arc::new(server_tx)));
    spawn_pump(client_rx, page.clone());
    spawn_pump(server_rx, host.clone());

    host.register_async("count", |args, reporter| {
        let to = args.first().and_then(|v| v.as_u64()).unwrap_or(0);
        for n in 1..to {
            reporter.progress(json!(n));
        }
        Ok(Some(json!(to)))
    });

    let mut call = page.call_with_progress("count", vec![json!(3)]);
    assert_eq!(call.reply.await.unwrap(), json!(3));
    let mut seen = Vec::new();
    while let Ok(v) = call.updates.try_recv() {
        seen.push(v);
    }
    assert_eq!(seen, vec![json!(1), json!(2), json!(3)]);
}
