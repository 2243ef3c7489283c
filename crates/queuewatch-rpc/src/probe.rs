//! Capability probe
//!
//! Asks the node which RPC namespaces it serves and looks for the diagnostic
//! one. Both `rpc_modules` style answers (`{"dev": "1.0", ...}`) and
//! `rpc_methods` style answers (`{"methods": ["dev_...", ...]}`) are
//! understood. Every failure mode reads as "unsupported".

use async_trait::async_trait;
use queuewatch_core::{CapabilityProbe, Target, TransportError, WatchdogConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::client::RpcClient;

/// Probe backed by a JSON-RPC listing call
#[derive(Debug, Clone)]
pub struct RpcCapabilityProbe {
    method: String,
    namespace: String,
    timeout: Duration,
}

impl RpcCapabilityProbe {
    pub fn new(method: impl Into<String>, namespace: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: method.into(),
            namespace: namespace.into(),
            timeout,
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(
            config.probe_method.clone(),
            config.diagnostic_namespace(),
            config.probe_timeout,
        )
    }

    async fn query(&self, target: &Target) -> Result<Value, TransportError> {
        let mut client = RpcClient::connect(&target.endpoint, self.timeout).await?;
        let listing = client.call(&self.method, json!([])).await;
        if let Err(e) = client.close().await {
            debug!(error = %e, "Probe connection close failed");
        }
        listing
    }

    /// Whether a listing answer contains the diagnostic namespace
    pub fn lists_namespace(&self, listing: &Value) -> bool {
        if let Some(methods) = listing.get("methods").and_then(Value::as_array) {
            let prefix = format!("{}_", self.namespace);
            return methods
                .iter()
                .filter_map(Value::as_str)
                .any(|m| m.starts_with(&prefix));
        }
        listing
            .as_object()
            .is_some_and(|modules| modules.contains_key(&self.namespace))
    }
}

#[async_trait]
impl CapabilityProbe for RpcCapabilityProbe {
    async fn supports(&self, target: &Target) -> bool {
        match timeout(self.timeout, self.query(target)).await {
            Ok(Ok(listing)) => {
                let supported = self.lists_namespace(&listing);
                debug!(target = %target.id, namespace = %self.namespace, supported, "Probe answered");
                supported
            }
            Ok(Err(e)) => {
                debug!(target = %target.id, error = %e, "Probe failed, treating as unsupported");
                false
            }
            Err(_) => {
                warn!(
                    target = %target.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out, treating as unsupported"
                );
                false
            }
        }
    }
}
