//! Protocol messages.
//!
//! A message is one frame of UTF-8 text. It is either a command token or a
//! payload for the command before it.

use crate::framing::{FrameDecoder, encode_frame};
use crate::{Command, ProtocolError};
use tracing::{debug, trace};

/// A decoded application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text that exactly matches a command literal.
    Command(Command),
    /// Anything else.
    Payload(String),
}

impl Message {
    /// Classify decoded text.
    pub fn classify(text: &str) -> Self {
        match text.parse::<Command>() {
            Ok(command) => Message::Command(command),
            Err(_) => Message::Payload(text.to_string()),
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Message::Command(command) => command.as_str(),
            Message::Payload(text) => text,
        }
    }

    /// Framed UTF-8 bytes ready to write.
    pub fn to_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self.as_text().as_bytes())
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

/// Turns raw read chunks into messages.
///
/// Frames that are not valid UTF-8 are dropped without surfacing an error.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    frames: FrameDecoder,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read chunk and return every message it completes.
    ///
    /// Only a framing error is returned; the stream is unusable after it.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Message>, ProtocolError> {
        self.frames.feed(chunk);

        let mut messages = Vec::new();
        while let Some(frame) = self.frames.decode_frame()? {
            match std::str::from_utf8(&frame) {
                Ok(text) => {
                    let message = Message::classify(text);
                    trace!("<-- {:?}", message);
                    messages.push(message);
                }
                Err(e) => {
                    debug!("Dropping frame that is not UTF-8 ({} bytes): {}", frame.len(), e);
                }
            }
        }
        Ok(messages)
    }

    pub fn has_partial_frame(&self) -> bool {
        self.frames.pending_bytes() > 0
    }
}
