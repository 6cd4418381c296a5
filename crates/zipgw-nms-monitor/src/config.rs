// crates/zipgw-nms-monitor/src/config.rs
//! JSON configuration of a monitored gateway.

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use zipgw_nms::{NmsConfig, NmsError};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(NmsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read configuration: {}", e),
            ConfigError::Json(e) => write!(f, "malformed configuration: {}", e),
            ConfigError::Invalid(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<NmsError> for ConfigError {
    fn from(e: NmsError) -> Self {
        ConfigError::Invalid(e)
    }
}

/// Settings of the web monitor and of the network management component it
/// watches. Missing fields take their defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub bind_addr: SocketAddr,
    /// Minimum time between two snapshots taken on the gateway thread.
    pub snapshot_interval_ms: u64,
    pub nms: NmsConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            snapshot_interval_ms: 250,
            nms: NmsConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.nms.validate()?;
        info!(
            "[Monitor] Configuration loaded: bind {}, snapshot every {}ms, smart start {}, mailbox {}",
            config.bind_addr,
            config.snapshot_interval_ms,
            config.nms.smart_start_enabled,
            config.nms.mailbox_enabled
        );
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("[Monitor] Reading configuration from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MonitorConfig::from_json_str(
            r#"{
                "bind_addr": "0.0.0.0:9000",
                "nms": {
                    "unsolicited_destination": "10.0.0.50:4123",
                    "timeouts": { "add_node_ms": 30000 }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.snapshot_interval_ms, 250);
        assert_eq!(
            config.nms.unsolicited_destination,
            Some("10.0.0.50:4123".parse().unwrap())
        );
        assert_eq!(config.nms.timeouts.add_node_ms, 30_000);
        assert_eq!(config.nms.timeouts.secure_add_ms, 250_000);
        assert!(config.nms.smart_start_enabled);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = MonitorConfig::from_json_str(r#"{ "nms": { "timeouts": { "dhcp_ms": 0 } } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let result = MonitorConfig::from_json_str("{ bind_addr: ");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = MonitorConfig::from_file("/nonexistent/zipgw-monitor.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
