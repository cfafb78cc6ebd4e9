//! Sync engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport channel the whiteboard protocol travels on.
pub const DEFAULT_CHANNEL: &str = "whiteboard";

/// Minimum spacing between cursor messages.
pub const DEFAULT_CURSOR_INTERVAL_MS: u64 = 500;

/// Minimum spacing between full-state broadcasts.
pub const DEFAULT_STATE_INTERVAL_MS: u64 = 5000;

/// Tunables for [`crate::SyncEngine`]. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Named transport channel for inbound and outbound messages.
    pub channel: String,
    pub cursor_interval_ms: u64,
    pub state_interval_ms: u64,
    /// Include the full history list in `state` broadcasts.
    pub share_history: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            cursor_interval_ms: DEFAULT_CURSOR_INTERVAL_MS,
            state_interval_ms: DEFAULT_STATE_INTERVAL_MS,
            share_history: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn cursor_interval(&self) -> Duration {
        Duration::from_millis(self.cursor_interval_ms)
    }

    pub fn state_interval(&self) -> Duration {
        Duration::from_millis(self.state_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.channel, "whiteboard");
        assert_eq!(config.cursor_interval(), Duration::from_millis(500));
        assert_eq!(config.state_interval(), Duration::from_secs(5));
        assert!(config.share_history);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"state_interval_ms": 0}"#).unwrap();
        assert_eq!(config.state_interval_ms, 0);
        assert_eq!(config.cursor_interval_ms, 500);
    }
}
