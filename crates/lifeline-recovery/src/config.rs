//! Polling policy for the recovering device.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How `RecoverySession::await_ready` paces its status probes.
///
/// The protocol has no cadence requirement of its own. The only constraint
/// is staying inside the store's rate limits, so both knobs default to
/// something polite and are overridable from config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between status probes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Probes before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.max_attempts, 120);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: PollConfig = serde_json::from_str(r#"{"interval_secs": 5}"#).unwrap();
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.max_attempts, 120);
    }
}
