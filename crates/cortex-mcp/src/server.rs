//! Request dispatcher.
//!
//! Holds the catalog handle and the dispatch table, enforces the
//! `initialize` handshake, and runs each tool under a deadline. Requests
//! from one client are answered strictly in the order received (the stdio
//! loop feeds them in sequentially); per-catalog write serialization comes
//! from the storage layer's write gate.
//!
//! Tool handlers run on the blocking pool. A handler that misses the
//! deadline is answered with a canceled error; if its write later commits
//! anyway, the write is durable but unacknowledged, which is exactly the
//! contract for a canceled-after-commit write. A panicking handler is
//! reported as an internal error without tearing the process down.

use std::sync::Arc;
use std::time::Duration;

use cortex_core::{CortexError, Storage};
use serde_json::Value;
use tracing::warn;

use crate::protocol::types::{Request, Response, RpcError};
use crate::tools;

/// Environment override for the per-request deadline, in milliseconds
pub const ENV_DEADLINE_MS: &str = "OMNI_CORTEX_DEADLINE_MS";

/// Default per-request deadline
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Per-client dispatcher state
pub struct Dispatcher {
    storage: Arc<Storage>,
    initialized: bool,
    deadline: Duration,
}

impl Dispatcher {
    /// Dispatcher with the deadline taken from the environment
    pub fn new(storage: Arc<Storage>) -> Self {
        let deadline = std::env::var(ENV_DEADLINE_MS)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEADLINE);
        Self::with_deadline(storage, deadline)
    }

    /// Dispatcher with an explicit deadline
    pub fn with_deadline(storage: Arc<Storage>, deadline: Duration) -> Self {
        Self {
            storage,
            initialized: false,
            deadline,
        }
    }

    /// Handle one request. Requests without an id are fire-and-forget:
    /// they are processed but get no response frame.
    pub async fn handle(&mut self, request: Request) -> Option<Response> {
        let id = request.id.clone();
        let wants_response = id.is_some();
        let method = request.method.clone();

        let outcome = self.dispatch(request).await;

        if !wants_response {
            if let Err(error) = &outcome {
                warn!("unacknowledged request {method} failed: {error}");
            }
            return None;
        }

        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::failure(id, error),
        })
    }

    async fn dispatch(&mut self, request: Request) -> Result<Value, RpcError> {
        if request.method == "initialize" {
            self.initialized = true;
            let tool_list: Vec<Value> = tools::REGISTRY
                .iter()
                .map(|spec| {
                    serde_json::json!({
                        "name": spec.name,
                        "description": spec.description,
                        "input_schema": (spec.schema)(),
                    })
                })
                .collect();
            return Ok(serde_json::json!({
                "server": "cortex-mcp",
                "version": env!("CARGO_PKG_VERSION"),
                "project_path": self.storage.project_path(),
                "tools": tool_list,
            }));
        }

        if !self.initialized {
            return Err(RpcError::not_initialized());
        }

        let Some(spec) = tools::find(&request.method) else {
            return Err(RpcError::method_not_found(&request.method));
        };

        let storage = Arc::clone(&self.storage);
        let params = request.params;
        let run = spec.run;
        let handle = tokio::task::spawn_blocking(move || run(&storage, params));

        match tokio::time::timeout(self.deadline, handle).await {
            Err(_) => {
                warn!("tool {} missed its deadline", request.method);
                Err(CortexError::Canceled.into())
            }
            Ok(Err(join_error)) => {
                warn!("tool {} panicked: {join_error}", request.method);
                Err(CortexError::Internal(format!(
                    "tool handler panicked: {join_error}"
                ))
                .into())
            }
            Ok(Ok(result)) => result.map_err(RpcError::from),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{Broadcaster, FixedClock};
    use tempfile::TempDir;

    fn dispatcher() -> (Dispatcher, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(
            &dir.path().join(".omni-cortex/cortex.db"),
            dir.path(),
            cortex_core::null_embedder(),
            Arc::new(FixedClock::new()),
            Broadcaster::new(dir.path().display().to_string()),
        )
        .unwrap();
        (Dispatcher::new(Arc::new(storage)), dir)
    }

    fn request(id: i64, method: &str, params: Value) -> Request {
        Request {
            id: Some(id.into()),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn test_initialize_lists_all_tools() {
        let (mut dispatcher, _dir) = dispatcher();
        let response = dispatcher
            .handle(request(1, "initialize", serde_json::json!({})))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["server"], "cortex-mcp");
        assert_eq!(result["tools"].as_array().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_tool_before_initialize_is_rejected() {
        let (mut dispatcher, _dir) = dispatcher();
        let response = dispatcher
            .handle(request(1, "cortex_list_tags", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn test_unknown_tool_after_initialize() {
        let (mut dispatcher, _dir) = dispatcher();
        dispatcher
            .handle(request(1, "initialize", serde_json::json!({})))
            .await;

        let response = dispatcher
            .handle(request(2, "cortex_levitate", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_remember_then_recall_roundtrip() {
        let (mut dispatcher, _dir) = dispatcher();
        dispatcher
            .handle(request(1, "initialize", serde_json::json!({})))
            .await;

        let response = dispatcher
            .handle(request(
                2,
                "cortex_remember",
                serde_json::json!({"content": "Use AES-GCM for envelope encryption"}),
            ))
            .await
            .unwrap();
        let id = response.result.unwrap()["id"].as_str().unwrap().to_string();

        let response = dispatcher
            .handle(request(
                3,
                "cortex_recall",
                serde_json::json!({"query": "AES", "mode": "keyword"}),
            ))
            .await
            .unwrap();
        let results = response.result.unwrap()["results"].clone();
        assert_eq!(results[0]["memory"]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_connection_usable() {
        let (mut dispatcher, _dir) = dispatcher();
        dispatcher
            .handle(request(1, "initialize", serde_json::json!({})))
            .await;

        let response = dispatcher
            .handle(request(2, "cortex_recall", serde_json::json!({"query": ""})))
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.path.as_deref(), Some("query"));

        // The dispatcher keeps serving
        let response = dispatcher
            .handle(request(3, "cortex_list_tags", serde_json::json!({})))
            .await
            .unwrap();
        assert!(response.result.is_some());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let (mut dispatcher, _dir) = dispatcher();
        dispatcher
            .handle(request(1, "initialize", serde_json::json!({})))
            .await;

        let response = dispatcher
            .handle(Request {
                id: None,
                method: "cortex_remember".to_string(),
                params: Some(serde_json::json!({"content": "quiet write"})),
            })
            .await;
        assert!(response.is_none());

        // The write still happened
        let response = dispatcher
            .handle(request(
                2,
                "cortex_recall",
                serde_json::json!({"query": "quiet", "mode": "keyword"}),
            ))
            .await
            .unwrap();
        assert_eq!(
            response.result.unwrap()["results"].as_array().unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_responses_preserve_request_order() {
        let (mut dispatcher, _dir) = dispatcher();
        dispatcher
            .handle(request(1, "initialize", serde_json::json!({})))
            .await;

        for i in 2..6 {
            let response = dispatcher
                .handle(request(
                    i,
                    "cortex_remember",
                    serde_json::json!({"content": format!("ordered {i}")}),
                ))
                .await
                .unwrap();
            assert_eq!(response.id.unwrap(), serde_json::json!(i));
        }
    }
}
