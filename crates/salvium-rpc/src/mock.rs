//! In-process HTTP server speaking the daemon and wallet-rpc JSON formats.
//!
//! Available to this crate's tests and, with the `test-util` feature, to
//! dependent crates. Every POST, whatever the path, is handed to a
//! synchronous handler that picks the reply.

use axum::extract::State;
use axum::http::Uri;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A request as seen by the handler.
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// `/json_rpc` for JSON-RPC calls, the endpoint for raw calls.
    pub path: String,
    pub body: Value,
}

impl MockRequest {
    /// JSON-RPC method name, `None` for raw endpoints.
    pub fn method(&self) -> Option<&str> {
        self.body.get("method").and_then(Value::as_str)
    }

    pub fn params(&self) -> &Value {
        self.body.get("params").unwrap_or(&Value::Null)
    }
}

/// The handler's answer.
#[derive(Debug, Clone)]
pub struct MockReply {
    body: Value,
    delay: Duration,
}

impl MockReply {
    /// JSON-RPC success envelope around `result`.
    pub fn result(result: Value) -> Self {
        Self::json(json!({ "jsonrpc": "2.0", "id": 0, "result": result }))
    }

    /// JSON-RPC error envelope.
    pub fn error(code: i64, message: &str) -> Self {
        Self::json(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": { "code": code, "message": message },
        }))
    }

    /// Body returned as is, for raw endpoints.
    pub fn json(body: Value) -> Self {
        Self {
            body,
            delay: Duration::ZERO,
        }
    }

    /// Hold the reply back for `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Arc<dyn Fn(&MockRequest) -> MockReply + Send + Sync>;

#[derive(Clone)]
struct ServerState {
    handler: Handler,
    requests: Arc<AtomicUsize>,
}

/// Running mock server. Stops when dropped.
pub struct MockServer {
    url: String,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Bind a free local port and serve `handler` on it.
    pub async fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(&MockRequest) -> MockReply + Send + Sync + 'static,
    {
        let requests = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            handler: Arc::new(handler),
            requests: requests.clone(),
        };
        let app = Router::new().fallback(answer).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::warn!("mock server stopped: {}", e);
            }
        });

        Ok(Self {
            url,
            requests,
            task,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests received so far, including ones still being answered.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(
    State(state): State<ServerState>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let request = MockRequest {
        path: uri.path().to_string(),
        body,
    };
    let reply = (state.handler)(&request);
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    Json(reply.body)
}

/// Node and wallet heights behind a [`MockChain`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ChainHeights {
    node: Arc<AtomicU64>,
    wallet: Arc<AtomicU64>,
    refreshes: Arc<AtomicUsize>,
}

impl ChainHeights {
    pub fn node(&self) -> u64 {
        self.node.load(Ordering::SeqCst)
    }

    pub fn wallet(&self) -> u64 {
        self.wallet.load(Ordering::SeqCst)
    }

    /// Mine (or pretend to) up to `height`.
    pub fn set_node(&self, height: u64) {
        self.node.store(height, Ordering::SeqCst);
    }

    /// `refresh` calls served so far.
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

/// A daemon and a wallet-rpc served from one address.
///
/// Answers `/get_height` for the daemon and `set_daemon`, `refresh` and
/// `get_height` for the wallet. Each `refresh` moves the wallet at most
/// `step` blocks towards the node.
pub struct MockChain {
    server: MockServer,
    heights: ChainHeights,
}

impl MockChain {
    pub async fn start(node_height: u64, wallet_height: u64, step: u64) -> std::io::Result<Self> {
        let heights = ChainHeights::default();
        heights.set_node(node_height);
        heights.wallet.store(wallet_height, Ordering::SeqCst);

        let chain = heights.clone();
        let server = MockServer::start(move |req| match (req.path.as_str(), req.method()) {
            ("/get_height", _) => {
                MockReply::json(json!({ "height": chain.node(), "status": "OK" }))
            }
            (_, Some("set_daemon")) => MockReply::result(json!({})),
            (_, Some("refresh")) => {
                chain.refreshes.fetch_add(1, Ordering::SeqCst);
                let before = chain.wallet();
                let after = before.saturating_add(step).min(chain.node()).max(before);
                chain.wallet.store(after, Ordering::SeqCst);
                MockReply::result(json!({
                    "blocks_fetched": after - before,
                    "received_money": false,
                }))
            }
            (_, Some("get_height")) => MockReply::result(json!({ "height": chain.wallet() })),
            (path, method) => {
                MockReply::error(-1, &format!("unexpected {} {:?}", path, method))
            }
        })
        .await?;

        Ok(Self { server, heights })
    }

    pub fn url(&self) -> &str {
        self.server.url()
    }

    pub fn heights(&self) -> ChainHeights {
        self.heights.clone()
    }
}
