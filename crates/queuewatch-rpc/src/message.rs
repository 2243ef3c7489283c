//! JSON-RPC 2.0 message types

use queuewatch_core::{SampleBatch, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing request
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// Reply to a request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Whether this response answers request `id`
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_u64() == Some(id)
    }

    /// Turn an error object into a transport error
    pub fn into_result(self) -> Result<Value, TransportError> {
        match self.error {
            Some(err) => Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Subscription payload of a notification
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationParams {
    pub subscription: Value,
    pub result: Value,
}

/// Unsolicited message pushed by the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    pub method: String,
    pub params: NotificationParams,
}

/// Anything the server may send
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Response(Response),
    Notification(Notification),
}

impl Incoming {
    /// Classify a raw frame payload
    pub fn parse(payload: &[u8]) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| TransportError::Protocol(format!("invalid JSON: {}", e)))?;

        let is_response = value.get("id").is_some_and(|id| !id.is_null())
            && (value.get("result").is_some() || value.get("error").is_some());

        if is_response {
            serde_json::from_value(value)
                .map(Incoming::Response)
                .map_err(|e| TransportError::Protocol(format!("invalid response: {}", e)))
        } else if value.get("method").is_some() {
            serde_json::from_value(value)
                .map(Incoming::Notification)
                .map_err(|e| TransportError::Protocol(format!("invalid notification: {}", e)))
        } else {
            Err(TransportError::Protocol(format!(
                "unrecognized message: {}",
                value
            )))
        }
    }
}

/// Decode a notification result into a batch.
///
/// A bare number is a one-value batch; an array is a batch of any size.
pub fn batch_from_value(value: &Value) -> Result<SampleBatch, TransportError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(SampleBatch::single)
            .ok_or_else(|| TransportError::Protocol(format!("sample is not a u64: {}", n))),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .ok_or_else(|| TransportError::Protocol(format!("sample is not a u64: {}", item)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(SampleBatch::from),
        other => Err(TransportError::Protocol(format!(
            "unexpected sample payload: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new(7, "rpc_modules", json!([]));
        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(
            text,
            r#"{"jsonrpc":"2.0","id":7,"method":"rpc_modules","params":[]}"#
        );
    }

    #[test]
    fn test_parse_response() {
        let msg = Incoming::parse(br#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#).unwrap();
        match msg {
            Incoming::Response(resp) => {
                assert!(resp.answers(1));
                assert_eq!(resp.into_result().unwrap(), json!("0x2a"));
            }
            _ => panic!("Expected response"),
        }
    }

    #[test]
    fn test_parse_null_result_response() {
        let msg = Incoming::parse(br#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        let Incoming::Response(resp) = msg else {
            panic!("Expected response");
        };
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_error_response() {
        let msg = Incoming::parse(
            br#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        let Incoming::Response(resp) = msg else {
            panic!("Expected response");
        };
        assert_eq!(
            resp.into_result().unwrap_err(),
            TransportError::Rpc {
                code: -32601,
                message: "Method not found".into()
            }
        );
    }

    #[test]
    fn test_parse_notification() {
        let msg = Incoming::parse(
            br#"{"jsonrpc":"2.0","method":"dev_subscribe_engine_queue_size","params":{"subscription":"0x1","result":3}}"#,
        )
        .unwrap();
        let Incoming::Notification(n) = msg else {
            panic!("Expected notification");
        };
        assert_eq!(n.params.subscription, json!("0x1"));
        assert_eq!(batch_from_value(&n.params.result).unwrap().values(), &[3]);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            Incoming::parse(b"not json"),
            Err(TransportError::Protocol(_))
        ));
        assert!(Incoming::parse(br#"{"jsonrpc":"2.0"}"#).is_err());
    }

    #[test]
    fn test_batch_from_array() {
        assert_eq!(batch_from_value(&json!([0, 1, 2])).unwrap().values(), &[0, 1, 2]);
        assert!(batch_from_value(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_batch_rejects_non_integers() {
        assert!(batch_from_value(&json!(-1)).is_err());
        assert!(batch_from_value(&json!([1, "2"])).is_err());
        assert!(batch_from_value(&json!({"depth": 1})).is_err());
    }
}
