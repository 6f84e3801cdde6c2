//! Command tokens.
//!
//! The first message of every exchange is one of these tokens. The set is
//! closed: anything else on the wire is a payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A command token, used both as wire literal and as match key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Command {
    /// Show a notification. Followed by a `title|body` payload.
    Notification,
    /// Connect every known peripheral.
    ConnectAll,
    /// Unregister every known peripheral.
    UnregisterAll,
    /// Replace the peripheral list. Followed by a JSON payload.
    SyncPeripherals,
    /// Response: the requested operation succeeded.
    OperationSuccess,
    /// Response: the requested operation failed.
    OperationFailed,
}

impl Command {
    /// Every command, in wire order.
    pub const ALL: [Command; 6] = [
        Command::Notification,
        Command::ConnectAll,
        Command::UnregisterAll,
        Command::SyncPeripherals,
        Command::OperationSuccess,
        Command::OperationFailed,
    ];

    /// The wire literal.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Notification => "notification",
            Command::ConnectAll => "connectAll",
            Command::UnregisterAll => "unregisterAll",
            Command::SyncPeripherals => "syncPeripherals",
            Command::OperationSuccess => "operationSuccess",
            Command::OperationFailed => "operationFailed",
        }
    }

    /// Whether the command waits for a payload message before it can run.
    pub fn expects_payload(self) -> bool {
        matches!(self, Command::Notification | Command::SyncPeripherals)
    }

    /// Whether the command is a reply rather than a request.
    pub fn is_response(self) -> bool {
        matches!(self, Command::OperationSuccess | Command::OperationFailed)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl TryFrom<String> for Command {
    type Error = UnknownCommand;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Command> for String {
    fn from(c: Command) -> Self {
        c.as_str().to_string()
    }
}

/// A string that is not one of the command literals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command token: {0:?}")]
pub struct UnknownCommand(pub String);
