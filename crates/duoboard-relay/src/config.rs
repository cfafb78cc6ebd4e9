//! Relay configuration from the environment.

use duoboard_core::transport::relay::ROOM_CAPACITY;
use std::net::SocketAddr;

pub const ADDR_VAR: &str = "DUOBOARD_RELAY_ADDR";
pub const CAPACITY_VAR: &str = "DUOBOARD_ROOM_CAPACITY";

const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3030);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub addr: SocketAddr,
    /// Peers allowed per room, between 1 and [`ROOM_CAPACITY`].
    pub room_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(DEFAULT_ADDR),
            room_capacity: ROOM_CAPACITY,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup. Unparseable values fall back to defaults.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ADDR_VAR) {
            match raw.parse() {
                Ok(addr) => config.addr = addr,
                Err(e) => tracing::warn!("ignoring {}={:?}: {}", ADDR_VAR, raw, e),
            }
        }
        if let Some(raw) = lookup(CAPACITY_VAR) {
            match raw.parse::<usize>() {
                Ok(capacity) => config.room_capacity = capacity.clamp(1, ROOM_CAPACITY),
                Err(e) => tracing::warn!("ignoring {}={:?}: {}", CAPACITY_VAR, raw, e),
            }
        }
        config
    }
}
