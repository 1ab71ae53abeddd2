//! Connection hub configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission and heartbeat settings for the connection hub.
///
/// Durations are (de)serialised as whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Largest number of simultaneous subscribers.
    pub max_connections: usize,
    /// Interval at which clients are expected to send `ping`.
    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,
    /// Silence after which a connection is evicted.
    #[serde(with = "millis")]
    pub heartbeat_timeout: Duration,
    /// Frames buffered per connection before it counts as unresponsive.
    pub outbound_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_timeout: Duration::from_secs(20),
            outbound_buffer: 64,
        }
    }
}

impl HubConfig {
    /// Creates a configuration with a custom connection ceiling.
    #[must_use]
    pub fn with_max_connections(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Self::default()
        }
    }

    /// Period of the eviction sweep: half the heartbeat interval.
    #[must_use]
    pub fn sweep_period(&self) -> Duration {
        self.heartbeat_interval.div_f64(2.0)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_heartbeat_protocol() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(20));
        assert_eq!(config.sweep_period(), Duration::from_millis(7500));
    }

    #[test]
    fn durations_are_milliseconds() {
        let config: HubConfig = serde_json::from_str(r#"{"heartbeat_timeout": 500}"#)
            .expect("config should parse");
        assert_eq!(config.heartbeat_timeout, Duration::from_millis(500));
        assert_eq!(config.max_connections, 100);

        let json = serde_json::to_value(config).expect("config should serialise");
        assert_eq!(
            json.get("heartbeat_interval"),
            Some(&serde_json::json!(15_000))
        );
    }
}
