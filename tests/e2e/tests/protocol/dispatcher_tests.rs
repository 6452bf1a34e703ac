//! Driving the full tool surface through the dispatcher, the way a stdio
//! client would.

use std::sync::Arc;

use cortex_e2e_tests::harness::catalog_without_embeddings;
use cortex_mcp::{Dispatcher, Request, Response};
use serde_json::{json, Value};

struct Client {
    dispatcher: Dispatcher,
    next_id: i64,
}

impl Client {
    async fn connect() -> (Self, tempfile::TempDir) {
        let catalog = catalog_without_embeddings();
        let mut client = Self {
            dispatcher: Dispatcher::new(Arc::clone(&catalog.storage)),
            next_id: 1,
        };
        let init = client.call("initialize", json!({})).await;
        assert!(init.result.is_some());
        (client, catalog.dir)
    }

    async fn call(&mut self, method: &str, params: Value) -> Response {
        let id = self.next_id;
        self.next_id += 1;
        self.dispatcher
            .handle(Request {
                id: Some(id.into()),
                method: method.to_string(),
                params: Some(params),
            })
            .await
            .expect("request with id gets a response")
    }

    async fn expect_ok(&mut self, method: &str, params: Value) -> Value {
        let response = self.call(method, params).await;
        match response.result {
            Some(result) => result,
            None => panic!("{method} failed: {:?}", response.error),
        }
    }
}

#[tokio::test]
async fn full_memory_lifecycle_over_the_wire() {
    let (mut client, _dir) = Client::connect().await;

    let id = client
        .expect_ok(
            "cortex_remember",
            json!({
                "content": "Use AES-GCM for envelope encryption",
                "type": "decision",
                "tags": ["crypto", "security"],
                "importance": 80
            }),
        )
        .await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let recall = client
        .expect_ok("cortex_recall", json!({"query": "AES", "mode": "keyword", "limit": 5}))
        .await;
    assert_eq!(recall["results"][0]["memory"]["id"], id.as_str());

    let updated = client
        .expect_ok(
            "cortex_update_memory",
            json!({"id": id, "patch": {"status": "needs_review"}}),
        )
        .await;
    assert_eq!(updated["status"], "needs_review");

    let review = client.expect_ok("cortex_review_memories", json!({})).await;
    assert!(review["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["memory"]["id"] == id.as_str()));

    let removed = client
        .expect_ok("cortex_forget", json!({"id": id}))
        .await["removed"]
        .as_u64()
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn linking_and_tags_over_the_wire() {
    let (mut client, _dir) = Client::connect().await;

    let a = client
        .expect_ok("cortex_remember", json!({"content": "first", "tags": ["x"]}))
        .await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let b = client
        .expect_ok("cortex_remember", json!({"content": "second", "tags": ["x", "y"]}))
        .await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let linked = client
        .expect_ok("cortex_link_memories", json!({"from": a, "to": b}))
        .await;
    assert_eq!(linked["linked"], true);
    let relinked = client
        .expect_ok("cortex_link_memories", json!({"from": a, "to": b}))
        .await;
    assert_eq!(relinked["linked"], false);

    let tags = client.expect_ok("cortex_list_tags", json!({})).await;
    assert_eq!(tags["tags"][0]["tag"], "x");
    assert_eq!(tags["tags"][0]["count"], 2);
}

#[tokio::test]
async fn hook_events_session_and_timeline_over_the_wire() {
    let (mut client, _dir) = Client::connect().await;

    let logged = client
        .expect_ok(
            "cortex_log_activity",
            json!({
                "event_type": "pre_tool_use",
                "tool_name": "Read",
                "tool_input": {"file_path": "src/main.rs"},
                "success": true
            }),
        )
        .await;
    let session_id = logged["session_id"].as_str().unwrap().to_string();

    let context = client
        .expect_ok("cortex_get_session_context", json!({}))
        .await;
    assert_eq!(context["currentSession"]["id"], session_id.as_str());

    client
        .expect_ok(
            "cortex_log_activity",
            json!({"event_type": "stop", "success": true}),
        )
        .await;

    // The stop closed the session; a fresh one appears on demand
    let next = client
        .expect_ok("cortex_start_session", json!({}))
        .await["id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(next, session_id);

    let ended = client.expect_ok("cortex_end_session", json!({})).await;
    assert_eq!(ended["id"], next.as_str());

    let activities = client
        .expect_ok("cortex_get_activities", json!({"filters": {"tool_name": "Read"}}))
        .await;
    assert_eq!(activities["activities"].as_array().unwrap().len(), 1);

    let timeline = client
        .expect_ok("cortex_get_timeline", json!({"hours": 24}))
        .await;
    assert!(timeline["events"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn export_over_the_wire() {
    let (mut client, _dir) = Client::connect().await;
    client
        .expect_ok("cortex_remember", json!({"content": "exported"}))
        .await;

    let exported = client
        .expect_ok("cortex_export", json!({"format": "jsonl"}))
        .await;
    let data = exported["data"].as_str().unwrap();
    assert!(data.lines().count() >= 2);
    for line in data.lines() {
        let envelope: Value = serde_json::from_str(line).unwrap();
        assert!(envelope["kind"].is_string());
    }
}

#[tokio::test]
async fn error_semantics_on_the_wire() {
    let (mut client, _dir) = Client::connect().await;

    // Missing required field names the path
    let response = client.call("cortex_remember", json!({})).await;
    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert_eq!(error.path.as_deref(), Some("content"));

    // Out-of-range importance
    let response = client
        .call("cortex_remember", json!({"content": "x", "importance": 101}))
        .await;
    assert_eq!(response.error.unwrap().path.as_deref(), Some("importance"));

    // Empty query
    let response = client.call("cortex_recall", json!({"query": ""})).await;
    assert_eq!(response.error.unwrap().path.as_deref(), Some("query"));

    // Unknown id on forget is success, not an error
    let response = client
        .call("cortex_forget", json!({"id": "mem-nope"}))
        .await;
    assert_eq!(response.result.unwrap()["removed"], 0);

    // The connection survives all of the above
    let response = client.call("cortex_list_tags", json!({})).await;
    assert!(response.result.is_some());
}
