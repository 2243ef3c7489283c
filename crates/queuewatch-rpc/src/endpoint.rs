//! Endpoint URL handling

use queuewatch_core::TransportError;

/// Convert a target's RPC URL into the WebSocket URL to dial.
///
/// `http`/`https` map to `ws`/`wss`; WebSocket URLs pass through unchanged.
pub fn websocket_url(endpoint: &str) -> Result<String, TransportError> {
    let endpoint = endpoint.trim();

    let converted = if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        endpoint.to_string()
    } else {
        return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
    };

    // Reject a bare scheme
    if converted.ends_with("://") {
        return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
    }

    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_becomes_ws() {
        assert_eq!(
            websocket_url("http://127.0.0.1:9545").unwrap(),
            "ws://127.0.0.1:9545"
        );
        assert_eq!(
            websocket_url("https://node.example/rpc").unwrap(),
            "wss://node.example/rpc"
        );
    }

    #[test]
    fn test_ws_passes_through() {
        assert_eq!(websocket_url("ws://host:8546").unwrap(), "ws://host:8546");
        assert_eq!(websocket_url(" wss://host ").unwrap(), "wss://host");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            websocket_url("tcp://host:1"),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!(websocket_url("127.0.0.1:9545").is_err());
        assert!(websocket_url("http://").is_err());
    }
}
