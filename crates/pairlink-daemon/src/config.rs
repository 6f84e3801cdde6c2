//! TOML configuration shared by the daemon and the CLI.
//!
//! ```toml
//! listen = "0.0.0.0:7878"
//!
//! [timeouts]
//! connect_secs = 10
//! response_secs = 10
//!
//! [[devices]]
//! name = "desk"
//! host = "192.168.1.20"
//! port = 7878
//!
//! [[peripherals]]
//! id = "m1"
//! name = "Mouse"
//! battery = 80
//! ```
//!
//! Unknown keys are rejected so a misspelled section is an error rather than
//! a silent fallback to defaults.

use pairlink_client::{ClientConfig, TransportConfig};
use pairlink_core::{Device, PeripheralRecord};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 7878;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the daemon accepts connections.
    pub listen: SocketAddr,
    pub timeouts: Timeouts,
    /// Paired devices the CLI can address by name.
    pub devices: Vec<Device>,
    /// Peripherals the daemon starts with.
    pub peripherals: Vec<PeripheralRecord>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            timeouts: Timeouts::default(),
            devices: Vec::new(),
            peripherals: Vec::new(),
        }
    }
}

/// Connection deadlines, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub connect_secs: u64,
    pub response_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            connect_secs: defaults.transport.connect_timeout.as_secs(),
            response_secs: defaults.response_timeout.as_secs(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no device named '{0}' in config")]
    UnknownDevice(String),
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Client settings derived from `[timeouts]`.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            transport: TransportConfig {
                connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
                ..TransportConfig::default()
            },
            response_timeout: Duration::from_secs(self.timeouts.response_secs),
        }
    }

    pub fn device(&self, name: &str) -> Result<Device, ConfigError> {
        self.devices
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDevice(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listen.port(), DEFAULT_PORT);
    }

    #[test]
    fn full_config() {
        let config = Config::parse(
            r#"
            listen = "127.0.0.1:9000"

            [timeouts]
            connect_secs = 3
            response_secs = 4

            [[devices]]
            name = "desk"
            host = "192.168.1.20"
            port = 7878

            [[peripherals]]
            id = "m1"
            name = "Mouse"
            battery = 80
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
        let client = config.client_config();
        assert_eq!(client.transport.connect_timeout, Duration::from_secs(3));
        assert_eq!(client.response_timeout, Duration::from_secs(4));
        assert_eq!(config.device("desk").unwrap().address(), "192.168.1.20:7878");
        assert!(matches!(
            config.device("phone"),
            Err(ConfigError::UnknownDevice(_))
        ));
        assert_eq!(config.peripherals[0].attributes.get("battery"), Some(&json!(80)));
    }

    #[test]
    fn partial_timeouts_keep_other_default() {
        let config = Config::parse("[timeouts]\nconnect_secs = 1").unwrap();
        let client = config.client_config();
        assert_eq!(client.transport.connect_timeout, Duration::from_secs(1));
        assert_eq!(client.response_timeout, ClientConfig::default().response_timeout);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(Config::parse("[connection]\nconnect_timeout = 1").is_err());
        assert!(Config::parse("[timeouts]\nconnect_timeout = 1").is_err());
        assert!(Config::parse("port = 7878").is_err());
    }

    #[test]
    fn bad_listen_address_rejected() {
        assert!(Config::parse(r#"listen = "not an address""#).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load(Path::new("/nonexistent/pairlink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
