//! Block-advance load driver
//!
//! The node produces blocks on its own; this driver just waits for its
//! unsafe head to move `requested` blocks past where it started, polling at
//! most `ceiling` times.

use async_trait::async_trait;
use queuewatch_core::{AdvanceReport, LoadDriver, LoadError, Target, TransportError, WatchdogConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::client::RpcClient;

const SYNC_STATUS_METHOD: &str = "optimism_syncStatus";

/// Waits for the unsafe L2 head to advance
#[derive(Debug, Clone)]
pub struct BlockAdvanceDriver {
    poll_interval: Duration,
    call_timeout: Duration,
}

impl BlockAdvanceDriver {
    pub fn new(poll_interval: Duration, call_timeout: Duration) -> Self {
        Self {
            poll_interval,
            call_timeout,
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(config.poll_interval, config.connect_timeout)
    }

    async fn unsafe_head(&self, client: &mut RpcClient) -> Result<u64, TransportError> {
        let status = timeout(self.call_timeout, client.call(SYNC_STATUS_METHOD, json!([])))
            .await
            .map_err(|_| TransportError::timeout(self.call_timeout))??;
        parse_unsafe_head(&status)
    }
}

/// Extract `unsafe_l2.number` from a sync status (number or hex string)
pub fn parse_unsafe_head(status: &Value) -> Result<u64, TransportError> {
    let number = status
        .get("unsafe_l2")
        .and_then(|head| head.get("number"))
        .ok_or_else(|| TransportError::Protocol("sync status missing unsafe_l2.number".into()))?;

    match number {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s
            .strip_prefix("0x")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok()),
        _ => None,
    }
    .ok_or_else(|| TransportError::Protocol(format!("invalid block number: {}", number)))
}

#[async_trait]
impl LoadDriver for BlockAdvanceDriver {
    async fn advance(
        &self,
        target: &Target,
        requested: u64,
        ceiling: u64,
    ) -> Result<AdvanceReport, LoadError> {
        let mut client = RpcClient::connect(&target.endpoint, self.call_timeout).await?;
        let start = self.unsafe_head(&mut client).await?;

        info!(target = %target.id, start, requested, ceiling, "Waiting for unsafe head to advance");

        let mut produced = 0;
        let mut attempts = 0;
        while attempts < ceiling {
            tokio::time::sleep(self.poll_interval).await;
            attempts += 1;

            match self.unsafe_head(&mut client).await {
                Ok(head) => {
                    produced = head.saturating_sub(start);
                    debug!(target = %target.id, head, produced, attempts, "Unsafe head polled");
                    if produced >= requested {
                        close_quietly(&mut client).await;
                        return Ok(AdvanceReport { produced, attempts });
                    }
                }
                Err(e) => debug!(target = %target.id, error = %e, attempts, "Sync status poll failed"),
            }
        }

        close_quietly(&mut client).await;
        Err(LoadError::CeilingReached {
            requested,
            produced,
            attempts,
        })
    }
}

async fn close_quietly(client: &mut RpcClient) {
    if let Err(e) = client.close().await {
        debug!(error = %e, "Sync status connection close failed");
    }
}
