//! Core types for pairlink.
//!
//! This crate provides the protocol primitives: command tokens, payload
//! formats, framing and the two-phase dispatcher. It does no I/O; the
//! runtime pieces live in `pairlink-client`.

mod command;
mod device;
mod dispatcher;
mod error;
pub mod framing;
mod message;
mod payload;

pub use command::{Command, UnknownCommand};
pub use device::{Device, DeviceParseError, Reachability};
pub use dispatcher::{Dispatcher, Invocation};
pub use error::ProtocolError;
pub use message::{Message, MessageDecoder};
pub use payload::{
    NOTIFICATION_SEPARATOR, NotificationPayload, PeripheralRecord, PeripheralSyncPayload,
};

/// Connection lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Establishing the connection.
    Setup,
    /// Handshake complete, reads and writes allowed.
    Ready,
    /// Unrecoverable error. Terminal.
    Failed(ProtocolError),
    /// Torn down locally or closed by the peer. Terminal.
    Cancelled,
}
