//! Watchdog configuration
//!
//! Durations are written in humantime form (`"10s"`, `"2m 30s"`) when
//! serialized, so config files stay readable.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Settings for one watchdog session across all targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Streaming diagnostic method to subscribe to
    pub subscribe_method: String,
    /// Method used to tear the subscription down
    pub unsubscribe_method: String,
    /// Method listing the namespaces a target exposes
    pub probe_method: String,
    /// Largest queue depth allowed by the invariant
    pub max_queue_depth: u64,
    /// Units of load (blocks) to produce per run
    pub units_requested: u64,
    /// Ceiling on load attempts before giving up
    pub units_ceiling: u64,
    /// Bound on the capability probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// Bound on connecting and receiving the subscription acknowledgment
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// How long to wait for the remote to close after stop fires
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
    /// Overall deadline for the load call
    #[serde(with = "humantime_serde")]
    pub run_timeout: Duration,
    /// Polling period of the block-advance driver
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            subscribe_method: "dev_subscribe_engine_queue_size".to_string(),
            unsubscribe_method: "dev_unsubscribe_engine_queue_size".to_string(),
            probe_method: "rpc_modules".to_string(),
            max_queue_depth: 1,
            units_requested: 40,
            units_ceiling: 100,
            probe_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(10),
            run_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl WatchdogConfig {
    /// Create a configuration with short timeouts for local testing
    pub fn local_test() -> Self {
        Self {
            units_requested: 5,
            units_ceiling: 20,
            probe_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(2),
            run_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    /// Namespace the subscribe method lives in (`dev` for `dev_subscribe_...`)
    pub fn diagnostic_namespace(&self) -> &str {
        self.subscribe_method
            .split_once('_')
            .map(|(ns, _)| ns)
            .unwrap_or(&self.subscribe_method)
    }

    /// Check that every bound is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscribe_method.is_empty() {
            return Err(ConfigError::Invalid {
                field: "subscribe_method",
                reason: "must not be empty".into(),
            });
        }
        if self.units_requested == 0 {
            return Err(ConfigError::Invalid {
                field: "units_requested",
                reason: "must be at least 1".into(),
            });
        }
        if self.units_ceiling == 0 {
            return Err(ConfigError::Invalid {
                field: "units_ceiling",
                reason: "must be at least 1".into(),
            });
        }

        let timeouts = [
            ("probe_timeout", self.probe_timeout),
            ("connect_timeout", self.connect_timeout),
            ("drain_timeout", self.drain_timeout),
            ("run_timeout", self.run_timeout),
            ("poll_interval", self.poll_interval),
        ];
        for (field, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }

        Ok(())
    }
}

// Helper module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        s.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatchdogConfig::default();
        assert_eq!(config.max_queue_depth, 1);
        assert_eq!(config.units_requested, 40);
        assert_eq!(config.units_ceiling, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_diagnostic_namespace() {
        let mut config = WatchdogConfig::default();
        assert_eq!(config.diagnostic_namespace(), "dev");

        config.subscribe_method = "queuesize".into();
        assert_eq!(config.diagnostic_namespace(), "queuesize");
    }

    #[test]
    fn test_config_serialization() {
        let config = WatchdogConfig::local_test();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"50ms\""));

        let recovered: WatchdogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, recovered);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: WatchdogConfig =
            serde_json::from_str(r#"{ "max_queue_depth": 4, "drain_timeout": "30s" }"#).unwrap();
        assert_eq!(config.max_queue_depth, 4);
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.units_requested, 40);
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let config = WatchdogConfig {
            drain_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "drain_timeout", .. }));

        let config = WatchdogConfig {
            units_requested: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
