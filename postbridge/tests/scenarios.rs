//! End-to-end call flows between two bridges.

use postbridge::{
    spawn_pump, AckOutcome, BridgeConfig, BridgeEngine, BridgeError, ErrorCode, FrameKind,
    Namespace, RecvOutcome,
};
use postbridge_transport::{ChannelTransport, RecordingTransport};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Two bridges on recording transports with frames relayed by hand.
struct Relay {
    host: BridgeEngine,
    host_out: Arc<RecordingTransport>,
    page: BridgeEngine,
    page_out: Arc<RecordingTransport>,
}

impl Relay {
    fn new() -> Self {
        let host_out = Arc::new(RecordingTransport::new());
        let page_out = Arc::new(RecordingTransport::new());
        Relay {
            host: BridgeEngine::with_config(host_out.clone(), BridgeConfig::named("host")),
            host_out,
            page: BridgeEngine::with_config(page_out.clone(), BridgeConfig::named("page")),
            page_out,
        }
    }

    fn host_to_page(&self) -> Vec<RecvOutcome> {
        self.host_out
            .take()
            .iter()
            .map(|raw| self.page.recv(raw))
            .collect()
    }

    fn page_to_host(&self) -> Vec<RecvOutcome> {
        self.page_out
            .take()
            .iter()
            .map(|raw| self.host.recv(raw))
            .collect()
    }
}

fn linked() -> (Arc<BridgeEngine>, Arc<BridgeEngine>) {
    postbridge::init_test_logging();
    let (host, page) = ChannelTransport::pair();
    let host_bridge = Arc::new(BridgeEngine::with_config(
        Arc::new(host.transport),
        BridgeConfig::named("host"),
    ));
    let page_bridge = Arc::new(BridgeEngine::with_config(
        Arc::new(page.transport),
        BridgeConfig::named("page"),
    ));
    spawn_pump(host.receiver, host_bridge.clone());
    spawn_pump(page.receiver, page_bridge.clone());
    (host_bridge, page_bridge)
}

fn first_arg(args: Vec<Value>) -> Result<Value, BridgeError> {
    Ok(args.into_iter().next().unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_echo_round_trip_frames() {
    let relay = Relay::new();
    relay.page.register("echo", first_arg);

    let reply = relay.host.call("echo", vec![json!("hi")]);

    let requests = relay.host_out.sent_frames();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, FrameKind::Request);
    assert_eq!(relay.host_to_page(), vec![RecvOutcome::Dispatched]);

    let acks = relay.page_out.sent_frames();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].ack_outcome(), Some(AckOutcome::Finish));
    assert!(acks[0].ack_payload().unwrap().complete);
    assert_eq!(relay.page_to_host(), vec![RecvOutcome::Settled]);

    assert_eq!(reply.await.unwrap(), json!("hi"));
    assert!(relay.host.pending().is_empty());
}

#[tokio::test]
async fn test_namespaced_handler_error_rejects_call() {
    let relay = Relay::new();
    relay.page.register_namespace(
        "room",
        Namespace::new()
            .method("setScenePath", |_| Err(BridgeError::remote("bad path")))
            .method("undo", |_| Ok(Value::Null)),
    );

    let reply = relay.host.call("room.setScenePath", vec![json!("/x")]);
    relay.host_to_page();

    let acks = relay.page_out.sent_frames();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].ack_outcome(), Some(AckOutcome::Error));
    assert_eq!(acks[0].ack_payload().unwrap().action_id, "room.setScenePath");
    relay.page_to_host();

    let err = reply.await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Remote);
    assert_eq!(err.message, "bad path");
}

#[tokio::test]
async fn test_progress_then_result() {
    let relay = Relay::new();
    relay.page.register_async("download", |_, reporter| {
        reporter.send(json!(10), false);
        reporter.send(json!(100), true);
        Ok(None)
    });

    let call = relay.host.call_with_progress("download", vec![]);
    let id = call.reply.correlation_id().clone();
    relay.host_to_page();

    let acks = relay.page_out.take();
    assert_eq!(acks.len(), 2);

    // Progress ack keeps the call pending
    assert_eq!(relay.host.recv(&acks[0]), RecvOutcome::Progress);
    assert!(relay.host.pending().has(&id));
    assert_eq!(relay.host.recv(&acks[1]), RecvOutcome::Settled);
    assert!(!relay.host.pending().has(&id));

    let mut updates = call.updates;
    assert_eq!(call.reply.await.unwrap(), json!(100));
    assert_eq!(updates.recv().await, Some(json!(10)));
    assert_eq!(updates.recv().await, Some(json!(100)));
}

#[tokio::test]
async fn test_unknown_method_never_answers() {
    let relay = Relay::new();
    let reply = relay.host.call("missing", vec![]);

    assert_eq!(relay.host_to_page(), vec![RecvOutcome::Unhandled]);
    assert!(relay.page_out.is_empty());

    let waited = tokio::time::timeout(Duration::from_millis(20), reply).await;
    assert!(waited.is_err(), "call must stay pending");
}

#[tokio::test]
async fn test_linked_bridges_call_each_other() {
    let (host, page) = linked();
    page.register("echo", first_arg);
    host.register("version", |_| Ok(json!("1.0")));

    assert_eq!(host.call("echo", vec![json!("hi")]).await.unwrap(), json!("hi"));
    assert_eq!(page.call("version", vec![]).await.unwrap(), json!("1.0"));
}

#[tokio::test]
async fn test_linked_progress_from_background_task() {
    let (host, page) = linked();
    page.register_async("download", |_, reporter| {
        tokio::spawn(async move {
            reporter.progress(json!(10));
            tokio::task::yield_now().await;
            reporter.complete(json!(100));
        });
        Ok(None)
    });

    let mut call = host.call_with_progress("download", vec![]);
    assert_eq!(call.updates.recv().await, Some(json!(10)));
    assert_eq!(call.reply.await.unwrap(), json!(100));
    assert_eq!(call.updates.recv().await, Some(json!(100)));
}

#[tokio::test]
async fn test_handler_calls_back_into_peer() {
    let (host, page) = linked();
    host.register("user", |_| Ok(json!("ada")));

    // The page answers "greet" by asking the host who the user is
    let page_for_handler = page.clone();
    page.register_async("greet", move |_, reporter| {
        let reply = page_for_handler.call("user", vec![]);
        tokio::spawn(async move {
            match reply.await {
                Ok(name) => reporter.complete(json!(format!("hello {}", name.as_str().unwrap_or("?")))),
                Err(e) => reporter.fail(&e),
            };
        });
        Ok(None)
    });

    assert_eq!(host.call("greet", vec![]).await.unwrap(), json!("hello ada"));
}

#[tokio::test]
async fn test_concurrent_calls_settle_independently() {
    let (host, page) = linked();
    page.register("double", |args| {
        Ok(json!(args.first().and_then(Value::as_i64).unwrap_or(0) * 2))
    });

    let replies: Vec<_> = (0..50).map(|n| host.call("double", vec![json!(n)])).collect();
    for (n, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply.await.unwrap(), json!(n as i64 * 2));
    }
    assert!(host.pending().is_empty());
}

#[tokio::test]
async fn test_peer_disconnect_cancels_calls() {
    let (host, page) = ChannelTransport::pair();
    let host_bridge = Arc::new(BridgeEngine::new(Arc::new(host.transport)));
    let pump = spawn_pump(host.receiver, host_bridge.clone());

    let reply = host_bridge.call("anything", vec![]);
    // Page side goes away without answering
    drop(page);

    assert!(pump.await.unwrap().is_ok());
    assert_eq!(reply.await.unwrap_err().code, ErrorCode::Canceled);
}

#[tokio::test]
async fn test_panicking_handler_rejects_remote_call() {
    let (host, page) = linked();
    page.register("explode", |_| panic!("kaboom"));

    let err = host.call("explode", vec![]).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Internal);
    assert!(err.message.contains("kaboom"));

    // The page keeps serving after the panic
    page.register("ok", |_| Ok(json!(true)));
    assert_eq!(host.call("ok", vec![]).await.unwrap(), json!(true));
}
