//! Target identity and endpoint
//!
//! A target is one node under test. Its identity key is only used for
//! correlation in logs and results; the endpoint is what transports dial.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

/// Stable identity key of a target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a target ID from any string-like key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetId {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// A node under test, immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Correlation key
    pub id: TargetId,
    /// Resolved RPC endpoint (http, https, ws or wss URL)
    pub endpoint: String,
}

impl Target {
    /// Create a new target
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: TargetId::new(id),
            endpoint: endpoint.into(),
        }
    }

    /// Identity key used in logs
    pub fn key(&self) -> &str {
        self.id.as_str()
    }
}

/// Parses `name=url`
impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, endpoint)) if !name.trim().is_empty() && !endpoint.trim().is_empty() => {
                Ok(Target::new(name.trim(), endpoint.trim()))
            }
            _ => Err(ConfigError::InvalidTarget(s.to_string())),
        }
    }
}
