//! Minimal JSON-RPC client over a single WebSocket connection
//!
//! Requests and notifications share the socket. Notifications that arrive
//! while a call is waiting for its response are buffered and handed out by
//! [`RpcClient::next_incoming`] before anything newer.

use futures::{SinkExt, StreamExt};
use queuewatch_core::TransportError;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::endpoint::websocket_url;
use crate::message::{Incoming, Notification, Request};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-RPC client bound to one WebSocket connection
pub struct RpcClient {
    url: String,
    stream: WsStream,
    next_id: u64,
    pending: VecDeque<Notification>,
    closed: bool,
}

impl RpcClient {
    /// Dial `endpoint` (http or ws URL), bounded by `connect_timeout`
    pub async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let url = websocket_url(endpoint)?;

        let (stream, _) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::timeout(connect_timeout))?
            .map_err(|e| TransportError::Connect {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        debug!(url = %url, "WebSocket connected");

        Ok(Self {
            url,
            stream,
            next_id: 1,
            pending: VecDeque::new(),
            closed: false,
        })
    }

    /// URL this client is connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a request without waiting for its response; returns the request id
    pub async fn send_request(&mut self, method: &str, params: Value) -> Result<u64, TransportError> {
        let id = self.next_id;
        self.next_id += 1;

        let text = serde_json::to_string(&Request::new(id, method, params))
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        trace!(id, method, "Sending request");
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(id)
    }

    /// Send a request and wait for the matching response.
    ///
    /// Not bounded by itself; wrap in a timeout.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.send_request(method, params).await?;

        loop {
            match self.read_frame().await? {
                Some(Incoming::Response(resp)) if resp.answers(id) => return resp.into_result(),
                Some(Incoming::Response(resp)) => {
                    // Late answer to an abandoned call
                    trace!(id = %resp.id, "Dropping stale response");
                }
                Some(Incoming::Notification(n)) => self.pending.push_back(n),
                None => {
                    return Err(TransportError::Connection(format!(
                        "connection closed while waiting for {}",
                        method
                    )))
                }
            }
        }
    }

    /// Next message from the server, or `None` once the connection closed.
    ///
    /// Cancel safe.
    pub async fn next_incoming(&mut self) -> Result<Option<Incoming>, TransportError> {
        if let Some(n) = self.pending.pop_front() {
            return Ok(Some(Incoming::Notification(n)));
        }
        self.read_frame().await
    }

    async fn read_frame(&mut self) -> Result<Option<Incoming>, TransportError> {
        loop {
            if self.closed {
                return Ok(None);
            }

            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => {
                    self.closed = true;
                    return Ok(None);
                }
                Some(Err(e)) => return Err(TransportError::Connection(e.to_string())),
            };

            match frame {
                Message::Text(text) => return Incoming::parse(text.as_bytes()).map(Some),
                Message::Binary(bytes) => return Incoming::parse(&bytes).map(Some),
                Message::Close(frame) => {
                    debug!(url = %self.url, ?frame, "Server closed connection");
                    self.closed = true;
                    return Ok(None);
                }
                // Ping replies are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    /// Start the close handshake.
    ///
    /// Messages the server sent before it saw our close frame are still
    /// returned by [`next_incoming`](Self::next_incoming).
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Connection(e.to_string())),
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("next_id", &self.next_id)
            .field("pending", &self.pending.len())
            .field("closed", &self.closed)
            .finish()
    }
}
