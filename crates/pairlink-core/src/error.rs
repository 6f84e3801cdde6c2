//! Protocol error taxonomy.

/// Errors raised by the protocol engine. All are connection-scoped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Handshake, DNS resolution or connection refused.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    /// Write error after the connection was ready.
    #[error("send failed: {0}")]
    SendFailed(String),
    /// Read error.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    /// A payload could not be parsed into its expected shape.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// An outgoing value could not be encoded.
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    /// A message arrived that does not fit the exchange.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),
    #[error("frame too large (max: {max}, got: {got})")]
    FrameTooLarge { max: usize, got: usize },
}
