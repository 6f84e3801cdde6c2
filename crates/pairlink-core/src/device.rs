//! Remote device identity.
//!
//! Device format: `name@host:port`, or `host:port` when the name is the host.
//!
//! The device list itself is owned by the registry; this crate only reads it
//! to open connections and to label diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Last known reachability of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reachability {
    #[default]
    Unknown,
    Reachable,
    Unreachable { reason: String },
}

/// A paired device we can open a connection to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub reachability: Reachability,
}

fn is_unknown(r: &Reachability) -> bool {
    *r == Reachability::Unknown
}

impl Device {
    /// Create a device with unknown reachability.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            reachability: Reachability::Unknown,
        }
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Same device, marked reachable.
    pub fn reachable(mut self) -> Self {
        self.reachability = Reachability::Reachable;
        self
    }

    /// Same device, marked unreachable for `reason`.
    pub fn unreachable(mut self, reason: impl Into<String>) -> Self {
        self.reachability = Reachability::Unreachable {
            reason: reason.into(),
        };
        self
    }

    /// Whether two entries refer to the same endpoint.
    pub fn same_endpoint(&self, other: &Device) -> bool {
        self.name == other.name && self.host == other.host && self.port == other.port
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}

impl FromStr for Device {
    type Err = DeviceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, addr) = match s.split_once('@') {
            Some((name, addr)) => (Some(name), addr),
            None => (None, s),
        };

        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| DeviceParseError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(DeviceParseError::EmptyHost);
        }
        let port: u16 = port
            .parse()
            .map_err(|_| DeviceParseError::InvalidPort(port.to_string()))?;

        let name = match name {
            Some("") => return Err(DeviceParseError::EmptyName),
            Some(name) => name,
            None => host,
        };

        Ok(Self::new(name, host, port))
    }
}

/// Error parsing a device string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceParseError {
    #[error("device must contain a ':port' suffix, got: {0}")]
    MissingPort(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("device host cannot be empty")]
    EmptyHost,
    #[error("device name before '@' cannot be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named() {
        let d: Device = "kitchen@192.168.1.20:7878".parse().unwrap();
        assert_eq!(d.name, "kitchen");
        assert_eq!(d.host, "192.168.1.20");
        assert_eq!(d.port, 7878);
        assert_eq!(d.reachability, Reachability::Unknown);
    }

    #[test]
    fn parse_unnamed_uses_host() {
        let d: Device = "localhost:9000".parse().unwrap();
        assert_eq!(d.name, "localhost");
        assert_eq!(d.address(), "localhost:9000");
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "nohost".parse::<Device>(),
            Err(DeviceParseError::MissingPort(_))
        ));
        assert!(matches!(
            "a@host:notaport".parse::<Device>(),
            Err(DeviceParseError::InvalidPort(_))
        ));
        assert!(matches!(
            "@host:1".parse::<Device>(),
            Err(DeviceParseError::EmptyName)
        ));
        assert!(matches!(
            ":1".parse::<Device>(),
            Err(DeviceParseError::EmptyHost)
        ));
    }

    #[test]
    fn display_roundtrip() {
        let d = Device::new("desk", "10.0.0.2", 7878);
        let back: Device = d.to_string().parse().unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn reachability_transitions() {
        let d = Device::new("desk", "10.0.0.2", 7878).unreachable("refused");
        assert_eq!(
            d.reachability,
            Reachability::Unreachable {
                reason: "refused".into()
            }
        );
        assert_eq!(d.reachable().reachability, Reachability::Reachable);
    }
}
