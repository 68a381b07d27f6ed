//! JSON-lines channel tests over an in-memory duplex pipe.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

use voicesearch_channel::{serve, VoiceSearchPlugin};
use voicesearch_core::{RecognitionOptions, Result};
use voicesearch_session::{
    HostSurface, MockAuthorizationGate, MockCapability, MockSurface, RecognitionEvent,
    SessionManager,
};

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    capability: Arc<MockCapability>,
    server: JoinHandle<Result<()>>,
    _surface: Arc<dyn HostSurface>,
}

fn start_server() -> Harness {
    let capability = Arc::new(MockCapability::new());
    let manager = SessionManager::new(
        capability.clone(),
        Arc::new(MockAuthorizationGate::granted()),
        RecognitionOptions::default(),
    );
    let plugin = Arc::new(VoiceSearchPlugin::new("voice_search", manager));
    let surface: Arc<dyn HostSurface> = Arc::new(MockSurface::new("main"));
    plugin.attach_to_engine();
    plugin.attach_surface(&surface);

    let (input, server_in) = tokio::io::duplex(4096);
    let (server_out, output) = tokio::io::duplex(4096);
    let server = tokio::spawn(serve(server_in, server_out, plugin));

    Harness {
        input,
        output: BufReader::new(output).lines(),
        capability,
        server,
        _surface: surface,
    }
}

impl Harness {
    async fn send(&mut self, line: &str) {
        self.input
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(2), self.output.next_line())
            .await
            .expect("no reply in time")
            .unwrap()
            .expect("output closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn wait_for_handle(&self) -> u64 {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(handle) = self.capability.latest_handle() {
                    return handle;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("recognizer never started")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_is_available_round_trip() {
    let mut h = start_server();
    h.send(r#"{"id":1,"method":"isAvailable","args":null}"#).await;
    assert_eq!(
        h.recv().await,
        json!({"id": 1, "reply": {"type": "success", "value": true}})
    );
}

#[tokio::test]
async fn test_start_listening_returns_transcript() {
    let mut h = start_server();
    h.send(r#"{"id":2,"method":"startListening"}"#).await;
    let handle = h.wait_for_handle().await;
    h.capability
        .fire(handle, RecognitionEvent::Results(vec!["turn left".to_string()]));

    assert_eq!(
        h.recv().await,
        json!({"id": 2, "reply": {"type": "success", "value": "turn left"}})
    );
}

#[tokio::test]
async fn test_recognition_error_reply() {
    let mut h = start_server();
    h.send(r#"{"id":3,"method":"startListening"}"#).await;
    let handle = h.wait_for_handle().await;
    h.capability.fire(handle, RecognitionEvent::Error(7));

    assert_eq!(
        h.recv().await,
        json!({"id": 3, "reply": {
            "type": "error",
            "code": "RECOGNITION_ERROR",
            "message": "Speech recognition error: 7"
        }})
    );
}

#[tokio::test]
async fn test_stop_answers_pending_start() {
    let mut h = start_server();
    h.send(r#"{"id":10,"method":"startListening"}"#).await;
    h.wait_for_handle().await;
    h.send(r#"{"id":11,"method":"stopListening"}"#).await;

    let mut replies = vec![h.recv().await, h.recv().await];
    replies.sort_by_key(|r| r["id"].as_u64());
    assert_eq!(
        replies,
        vec![
            json!({"id": 10, "reply": {"type": "success", "value": ""}}),
            json!({"id": 11, "reply": {"type": "success", "value": null}}),
        ]
    );
    assert!(h.capability.live_handles().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_and_stop_in_one_write() {
    for _ in 0..50 {
        let mut h = start_server();
        h.send(concat!(
            r#"{"id":1,"method":"startListening"}"#,
            "\n",
            r#"{"id":2,"method":"stopListening"}"#
        ))
        .await;

        let mut replies = vec![h.recv().await, h.recv().await];
        replies.sort_by_key(|r| r["id"].as_u64());
        assert_eq!(
            replies,
            vec![
                json!({"id": 1, "reply": {"type": "success", "value": ""}}),
                json!({"id": 2, "reply": {"type": "success", "value": null}}),
            ]
        );
        assert!(h.capability.live_handles().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_back_to_back_starts_each_answered_once() {
    let mut h = start_server();
    h.send(concat!(
        r#"{"id":1,"method":"startListening"}"#,
        "\n",
        r#"{"id":2,"method":"startListening"}"#
    ))
    .await;

    // The first start is superseded by the second.
    assert_eq!(
        h.recv().await,
        json!({"id": 1, "reply": {"type": "success", "value": ""}})
    );
    h.wait_for_handle().await;
    assert_eq!(h.capability.latest_handle(), Some(2));
    h.capability
        .fire(2, RecognitionEvent::Results(vec!["second".to_string()]));
    assert_eq!(
        h.recv().await,
        json!({"id": 2, "reply": {"type": "success", "value": "second"}})
    );
    assert_eq!(h.capability.peak_live_handles(), 1);

    // Nothing else is written for either id.
    let extra = tokio::time::timeout(Duration::from_millis(100), h.output.next_line()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn test_unknown_method_not_implemented() {
    let mut h = start_server();
    h.send(r#"{"id":5,"method":"setLocale","args":{"locale":"fr"}}"#).await;
    assert_eq!(
        h.recv().await,
        json!({"id": 5, "reply": {"type": "not_implemented"}})
    );
}

#[tokio::test]
async fn test_malformed_line_gets_invalid_request() {
    let mut h = start_server();
    h.send("not json").await;
    let reply = h.recv().await;
    assert_eq!(reply["id"], json!(0));
    assert_eq!(reply["reply"]["type"], json!("error"));
    assert_eq!(reply["reply"]["code"], json!("INVALID_REQUEST"));

    // The loop keeps serving after a bad line.
    h.send(r#"{"id":6,"method":"isAvailable"}"#).await;
    assert_eq!(h.recv().await["id"], json!(6));
}

#[tokio::test]
async fn test_eof_answers_pending_start_and_releases_recognizer() {
    let mut h = start_server();
    h.send(r#"{"id":8,"method":"startListening"}"#).await;
    h.wait_for_handle().await;

    let capability = h.capability.clone();
    drop(h.input);

    let line = tokio::time::timeout(Duration::from_secs(2), h.output.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply, json!({"id": 8, "reply": {"type": "success", "value": ""}}));

    tokio::time::timeout(Duration::from_secs(2), h.server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(capability.live_handles().is_empty());
}
