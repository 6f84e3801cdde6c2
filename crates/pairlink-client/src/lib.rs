//! Runtime side of pairlink.
//!
//! - [`Transport`]: one TCP connection driven by its own task.
//! - [`Connection`]: lifecycle controller turning transport events into
//!   [`ConnectionObserver`] callbacks.
//! - [`Session`] and [`serve`]: the responder, running commands through
//!   [`Handlers`].
//! - [`Client`]: the initiator, one fresh connection per exchange.

mod client;
mod connection;
mod handlers;
mod session;
pub mod store;
mod transport;

pub use client::{Client, ClientConfig, ExchangeError, ExchangeOutcome};
pub use connection::{Connection, ConnectionObserver, Flow};
pub use handlers::Handlers;
pub use session::{Session, serve};
pub use store::{
    DeviceRegistry, LogNotifier, MemoryDeviceRegistry, MemoryPeripheralStore, NotificationSink,
    PeripheralStore,
};
pub use transport::{ReadResult, Transport, TransportConfig, TransportEvent};
