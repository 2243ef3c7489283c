//! Shared test helpers

pub mod fake_node;

pub use fake_node::{FakeNode, FakeNodeConfig};

/// Reserve a local port and release it, leaving nothing listening there
pub async fn unused_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("queuewatch_rpc=debug")
        .with_test_writer()
        .try_init();
}
