//! Queuewatch RPC - JSON-RPC 2.0 over WebSocket
//!
//! This crate implements the collaborator traits from `queuewatch-core`
//! against a node's RPC endpoint:
//!
//! - **Capability probe**: asks the node which namespaces it serves
//! - **Sample source**: subscribes to a streaming diagnostic method and turns
//!   notifications into sample batches
//! - **Block-advance driver**: waits for the node's unsafe head to move
//!
//! # Example
//!
//! ```rust,no_run
//! use queuewatch_core::{SampleSource, Target, WatchdogConfig};
//! use queuewatch_rpc::WsSampleSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WatchdogConfig::default();
//!     let source = WsSampleSource::from_config(&config);
//!
//!     let target = Target::new("kona-0", "http://127.0.0.1:9545");
//!     let mut subscription = source.subscribe(&target).await?;
//!
//!     while let Some(batch) = subscription.next_batch().await? {
//!         println!("queue depth: {:?}", batch.values());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod driver;
pub mod endpoint;
pub mod message;
pub mod probe;
pub mod subscription;

// Re-exports
pub use client::RpcClient;
pub use driver::BlockAdvanceDriver;
pub use endpoint::websocket_url;
pub use message::{Incoming, Notification, Response};
pub use probe::RpcCapabilityProbe;
pub use subscription::{WsSampleSource, WsSubscription};
