//! FakeNode - in-process JSON-RPC WebSocket server
//!
//! Speaks just enough of a node's RPC surface for transport tests:
//! - `rpc_modules` listing the configured namespaces
//! - `dev_subscribe_engine_queue_size` acknowledging with id `"0x1"` and
//!   pushing the scripted notifications
//! - `dev_unsubscribe_engine_queue_size` pushing the trailing notifications,
//!   answering, then closing the socket
//! - `optimism_syncStatus` reporting an unsafe head that moves `block_step`
//!   blocks per call

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

const SUBSCRIPTION_ID: &str = "0x1";

/// Behaviour of a fake node
#[derive(Debug, Clone)]
pub struct FakeNodeConfig {
    /// Namespaces reported by `rpc_modules`
    pub modules: Vec<&'static str>,
    /// Notification results pushed right after the subscribe ack
    pub script: Vec<Value>,
    /// Notification results pushed after the unsubscribe request arrives
    pub trailing: Vec<Value>,
    /// Answer subscribe with "method not found"
    pub reject_subscribe: bool,
    /// Push a notification for an unrelated subscription before the script
    pub foreign_noise: bool,
    /// Blocks the unsafe head advances per sync status call
    pub block_step: u64,
    /// Accept connections but never answer
    pub silent: bool,
}

impl Default for FakeNodeConfig {
    fn default() -> Self {
        Self {
            modules: vec!["dev", "eth", "optimism"],
            script: Vec::new(),
            trailing: Vec::new(),
            reject_subscribe: false,
            foreign_noise: false,
            block_step: 1,
            silent: false,
        }
    }
}

struct NodeState {
    config: FakeNodeConfig,
    height: AtomicU64,
    methods: Mutex<Vec<String>>,
}

/// A running fake node; the server stops when this is dropped
pub struct FakeNode {
    pub addr: SocketAddr,
    state: Arc<NodeState>,
    server: JoinHandle<()>,
}

impl FakeNode {
    pub async fn start(config: FakeNodeConfig) -> Self {
        let state = Arc::new(NodeState {
            config,
            height: AtomicU64::new(100),
            methods: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Methods received so far, in arrival order
    pub fn methods_seen(&self) -> Vec<String> {
        self.state.methods.lock().unwrap().clone()
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<NodeState>) {
    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default().to_string();
        state.methods.lock().unwrap().push(method.clone());

        let config = &state.config;
        if config.silent {
            continue;
        }

        match method.as_str() {
            "rpc_modules" => {
                let modules: Map<String, Value> = config
                    .modules
                    .iter()
                    .map(|m| (m.to_string(), json!("1.0")))
                    .collect();
                reply(&mut socket, id, Value::Object(modules)).await;
            }
            "dev_subscribe_engine_queue_size" if config.reject_subscribe => {
                reply_error(&mut socket, id, -32601, "Method not found").await;
            }
            "dev_subscribe_engine_queue_size" => {
                reply(&mut socket, id, json!(SUBSCRIPTION_ID)).await;
                if config.foreign_noise {
                    notify(&mut socket, "0x99", json!(1000)).await;
                }
                for result in &config.script {
                    notify(&mut socket, SUBSCRIPTION_ID, result.clone()).await;
                }
            }
            "dev_unsubscribe_engine_queue_size" => {
                for result in &config.trailing {
                    notify(&mut socket, SUBSCRIPTION_ID, result.clone()).await;
                }
                reply(&mut socket, id, json!(true)).await;
                let _ = socket.send(Message::Close(None)).await;
            }
            "optimism_syncStatus" => {
                let height = state.height.fetch_add(config.block_step, Ordering::SeqCst);
                reply(&mut socket, id, json!({"unsafe_l2": {"number": height}})).await;
            }
            _ => reply_error(&mut socket, id, -32601, "Method not found").await,
        }
    }
}

async fn reply(socket: &mut WebSocket, id: Value, result: Value) {
    let body = json!({"jsonrpc": "2.0", "id": id, "result": result});
    let _ = socket.send(Message::Text(body.to_string())).await;
}

async fn reply_error(socket: &mut WebSocket, id: Value, code: i64, message: &str) {
    let body = json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}});
    let _ = socket.send(Message::Text(body.to_string())).await;
}

async fn notify(socket: &mut WebSocket, subscription: &str, result: Value) {
    let body = json!({
        "jsonrpc": "2.0",
        "method": "dev_subscription",
        "params": {"subscription": subscription, "result": result},
    });
    let _ = socket.send(Message::Text(body.to_string())).await;
}
