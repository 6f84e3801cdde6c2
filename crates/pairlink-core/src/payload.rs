//! Payload formats carried after a command token.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};

/// Separator between title and body in a notification payload.
pub const NOTIFICATION_SEPARATOR: char = '|';

/// A notification to display on the remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Encode as `title|body`.
    ///
    /// Neither part may contain the separator, otherwise the peer cannot
    /// split it back into exactly two parts.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        if self.title.contains(NOTIFICATION_SEPARATOR) || self.body.contains(NOTIFICATION_SEPARATOR)
        {
            return Err(ProtocolError::EncodeFailed(format!(
                "notification parts cannot contain '{NOTIFICATION_SEPARATOR}'"
            )));
        }
        Ok(format!("{}{NOTIFICATION_SEPARATOR}{}", self.title, self.body))
    }

    /// Decode a `title|body` payload. Fails unless there are exactly two parts.
    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = payload.split(NOTIFICATION_SEPARATOR).collect();
        match parts.as_slice() {
            [title, body] => Ok(Self::new(*title, *body)),
            _ => Err(ProtocolError::DecodeFailed(format!(
                "notification payload has {} part(s), expected 2",
                parts.len()
            ))),
        }
    }
}

/// A managed peripheral as exchanged in a sync payload.
///
/// The store owns the full schema. Fields other than `id` and `name` are kept
/// verbatim in `attributes` so they survive the round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralRecord {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl PeripheralRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: serde_json::Map::new(),
        }
    }

    /// Attach an extra store-defined attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Ordered list of peripherals pushed by `syncPeripherals`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeripheralSyncPayload {
    pub peripherals: Vec<PeripheralRecord>,
}

impl PeripheralSyncPayload {
    pub fn new(peripherals: Vec<PeripheralRecord>) -> Self {
        Self { peripherals }
    }

    /// Serialize as a JSON array.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::EncodeFailed(e.to_string()))
    }

    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(payload).map_err(|e| ProtocolError::DecodeFailed(e.to_string()))
    }
}
