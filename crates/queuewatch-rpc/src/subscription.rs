//! Streaming diagnostic subscription over WebSocket
//!
//! [`WsSampleSource::subscribe`] returns only after the node answered the
//! subscribe call with a subscription id. That answer is the acknowledgment
//! the harness waits on before it starts producing load.

use async_trait::async_trait;
use queuewatch_core::{SampleBatch, SampleSource, Subscription, Target, TransportError, WatchdogConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::client::RpcClient;
use crate::message::{batch_from_value, Incoming};

/// Opens `dev_subscribe_*` style subscriptions
#[derive(Debug, Clone)]
pub struct WsSampleSource {
    subscribe_method: String,
    unsubscribe_method: String,
    connect_timeout: Duration,
}

impl WsSampleSource {
    pub fn new(
        subscribe_method: impl Into<String>,
        unsubscribe_method: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            subscribe_method: subscribe_method.into(),
            unsubscribe_method: unsubscribe_method.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(
            config.subscribe_method.clone(),
            config.unsubscribe_method.clone(),
            config.connect_timeout,
        )
    }
}

#[async_trait]
impl SampleSource for WsSampleSource {
    async fn subscribe(&self, target: &Target) -> Result<Box<dyn Subscription>, TransportError> {
        let mut client = RpcClient::connect(&target.endpoint, self.connect_timeout).await?;

        let subscription_id = timeout(
            self.connect_timeout,
            client.call(&self.subscribe_method, json!([])),
        )
        .await
        .map_err(|_| TransportError::timeout(self.connect_timeout))??;

        if !(subscription_id.is_string() || subscription_id.is_number()) {
            return Err(TransportError::Protocol(format!(
                "unexpected subscription id: {}",
                subscription_id
            )));
        }

        debug!(
            target = %target.id,
            method = %self.subscribe_method,
            subscription = %subscription_id,
            "Subscription acknowledged"
        );

        Ok(Box::new(WsSubscription {
            client,
            subscription_id,
            unsubscribe_method: self.unsubscribe_method.clone(),
            closing: false,
        }))
    }
}

/// A live subscription on its own WebSocket connection
#[derive(Debug)]
pub struct WsSubscription {
    client: RpcClient,
    subscription_id: Value,
    unsubscribe_method: String,
    closing: bool,
}

impl WsSubscription {
    pub fn subscription_id(&self) -> &Value {
        &self.subscription_id
    }
}

#[async_trait]
impl Subscription for WsSubscription {
    async fn next_batch(&mut self) -> Result<Option<SampleBatch>, TransportError> {
        loop {
            match self.client.next_incoming().await? {
                None => return Ok(None),
                Some(Incoming::Notification(n)) if n.params.subscription == self.subscription_id => {
                    return batch_from_value(&n.params.result).map(Some);
                }
                Some(Incoming::Notification(n)) => {
                    trace!(subscription = %n.params.subscription, "Ignoring foreign notification");
                }
                Some(Incoming::Response(resp)) => {
                    // Only the unsubscribe call is outstanding at this point
                    if let Err(e) = resp.into_result() {
                        warn!(error = %e, "Unsubscribe rejected");
                    }
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closing {
            return Ok(());
        }
        self.closing = true;

        self.client
            .send_request(&self.unsubscribe_method, json!([self.subscription_id]))
            .await?;
        self.client.close().await?;

        debug!(url = %self.client.url(), "Subscription closing");
        Ok(())
    }
}
