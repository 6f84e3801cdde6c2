//! Two-phase command dispatch.
//!
//! Payload-expecting commands arrive as two messages: the token, then the
//! payload. The dispatcher remembers the last token seen on a connection and
//! pairs the next payload with it.

use crate::{Command, Message, ProtocolError};
use tracing::debug;

/// A command ready for its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    /// Present for payload-expecting commands.
    pub payload: Option<String>,
}

impl Invocation {
    fn bare(command: Command) -> Self {
        Self {
            command,
            payload: None,
        }
    }
}

/// Per-connection dispatch state.
///
/// Holds at most one pending command. A new token replaces a pending one, so
/// a payload is always matched with the token immediately before it.
#[derive(Debug, Default)]
pub struct Dispatcher {
    pending: Option<Command>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The command waiting for its payload, if any.
    pub fn pending(&self) -> Option<Command> {
        self.pending
    }

    /// Apply one message. Returns the invocation to run, if the message
    /// completes one.
    pub fn dispatch(&mut self, message: Message) -> Option<Invocation> {
        match message {
            Message::Command(command) if command.expects_payload() => {
                if let Some(previous) = self.pending.replace(command) {
                    debug!("{} replaced pending {} before its payload", command, previous);
                }
                None
            }
            Message::Command(command) => {
                if let Some(previous) = self.pending.take() {
                    debug!("{} dropped pending {}", command, previous);
                }
                Some(Invocation::bare(command))
            }
            Message::Payload(payload) => match self.pending.take() {
                Some(command) => Some(Invocation {
                    command,
                    payload: Some(payload),
                }),
                None => {
                    let error = ProtocolError::ProtocolMismatch(format!(
                        "payload of {} bytes with no pending command",
                        payload.len()
                    ));
                    debug!("Discarding message: {}", error);
                    None
                }
            },
        }
    }
}
