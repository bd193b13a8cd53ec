//! Link configuration
//!
//! Every section has working defaults; a TOML file only needs the keys it
//! wants to override.

use anyhow::{Context, Result};
use link_shared::{defaults, RemoteEndpoint};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Platform used to open the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BluetoothMode {
    /// Use real RFCOMM Bluetooth (requires BlueZ and the `bluetooth` feature)
    Rfcomm,
    /// Use TCP simulation (for development)
    #[default]
    TcpSimulation,
}

/// Bluetooth configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Bluetooth transport mode
    pub mode: BluetoothMode,
    /// Serial service UUID resolved by the normal open
    pub service_uuid: String,
    /// RFCOMM channel dialled directly when the service lookup fails
    pub fallback_channel: u8,
    /// Alternate address for the TCP simulation fallback
    pub tcp_fallback_address: Option<String>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            mode: BluetoothMode::TcpSimulation,
            service_uuid: defaults::SPP_SERVICE_UUID.into(),
            fallback_channel: defaults::FALLBACK_RFCOMM_CHANNEL,
            tcp_fallback_address: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Configuration for the serial link
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bytes requested per transport read
    pub read_buffer_size: usize,
    /// Per-open timeout in milliseconds (no timeout when unset)
    pub connect_timeout_ms: Option<u64>,
    /// Device to connect to when none is given on the command line
    pub device: Option<RemoteEndpoint>,
    /// Bluetooth configuration
    pub bluetooth: BluetoothConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: defaults::READ_BUFFER_SIZE,
            connect_timeout_ms: None,
            device: None,
            bluetooth: BluetoothConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: LinkConfig =
            toml::from_str(contents).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Per-open timeout, if any
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            anyhow::bail!("read_buffer_size must be > 0");
        }
        if self.connect_timeout_ms == Some(0) {
            anyhow::bail!("connect_timeout_ms must be > 0 when set");
        }
        if self.bluetooth.service_uuid.trim().is_empty() {
            anyhow::bail!("bluetooth.service_uuid must not be empty");
        }
        if !(1..=30).contains(&self.bluetooth.fallback_channel) {
            anyhow::bail!(
                "bluetooth.fallback_channel must be in 1..=30, got {}",
                self.bluetooth.fallback_channel
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.read_buffer_size, 1024);
        assert!(config.connect_timeout().is_none());
        assert_eq!(config.bluetooth.mode, BluetoothMode::TcpSimulation);
        assert_eq!(config.bluetooth.service_uuid, defaults::SPP_SERVICE_UUID);
        assert_eq!(config.bluetooth.fallback_channel, 1);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = LinkConfig::from_toml("").expect("empty config should parse");
        assert_eq!(config.read_buffer_size, defaults::READ_BUFFER_SIZE);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let config = LinkConfig::from_toml(
            r#"
            read_buffer_size = 512
            connect_timeout_ms = 2500

            [device]
            address = "00:11:22:33:44:55"
            name = "HC-05"

            [bluetooth]
            mode = "rfcomm"
            service_uuid = "00001101-0000-1000-8000-00805f9b34fb"
            fallback_channel = 3
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.read_buffer_size, 512);
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(
            config.device,
            Some(RemoteEndpoint::new("00:11:22:33:44:55", "HC-05"))
        );
        assert_eq!(config.bluetooth.mode, BluetoothMode::Rfcomm);
        assert_eq!(
            config.bluetooth.service_uuid,
            "00001101-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(config.bluetooth.fallback_channel, 3);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(LinkConfig::from_toml("read_buffer_size = 0").is_err());
        assert!(LinkConfig::from_toml("connect_timeout_ms = 0").is_err());
        assert!(LinkConfig::from_toml("[bluetooth]\nfallback_channel = 31").is_err());
        assert!(LinkConfig::from_toml("[bluetooth]\nservice_uuid = \"\"").is_err());
        assert!(LinkConfig::from_toml("[bluetooth]\nmode = \"carrier_pigeon\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let config = LinkConfig::load(file.path()).expect("load failed");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(LinkConfig::load(Path::new("/nonexistent/link.toml")).is_err());
    }
}
