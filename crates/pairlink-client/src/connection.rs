//! Connection lifecycle controller.
//!
//! Drives a [`Transport`] through Setup → Ready → (Failed | Cancelled) and
//! turns its raw events into calls on a [`ConnectionObserver`]. Failure is
//! terminal: a caller that wants to retry builds a new connection.

use crate::store::DeviceRegistry;
use crate::transport::{ReadResult, Transport, TransportConfig, TransportEvent};
use pairlink_core::{ConnectionState, Device, Message, MessageDecoder, ProtocolError};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// What the observer wants after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Cancel the connection. No further callbacks fire.
    Finish,
}

/// The application side of a connection.
///
/// Callbacks for one connection never overlap.
pub trait ConnectionObserver: Send {
    /// Called exactly once, when the connection first becomes ready.
    /// Starting the receive loop (`transport.receive()`) is up to the observer.
    fn on_ready(&mut self, transport: &Transport) -> Flow;

    /// Completion of one send, in submission order. A failed send does not
    /// end the connection unless the observer says so.
    fn on_sent(&mut self, _transport: &Transport, _result: &Result<(), ProtocolError>) -> Flow {
        Flow::Continue
    }

    /// One complete message from the peer.
    fn on_message(&mut self, transport: &Transport, message: Message) -> Flow;
}

/// A connection to one device, owned by the task that runs it.
pub struct Connection<O> {
    device: Device,
    transport: Transport,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    observer: O,
    registry: Option<Arc<dyn DeviceRegistry>>,
    decoder: MessageDecoder,
    ready_fired: bool,
}

impl<O: ConnectionObserver> Connection<O> {
    /// Start an outbound connection to `device`.
    pub fn connect(device: Device, config: &TransportConfig, observer: O) -> Self {
        let (transport, events) = Transport::start(device.address(), config);
        Self::with_transport(device, transport, events, observer)
    }

    /// Drive an accepted stream from `peer`.
    pub fn accepted(stream: TcpStream, peer: Device, config: &TransportConfig, observer: O) -> Self {
        let (transport, events) = Transport::from_stream(stream, config);
        Self::with_transport(peer, transport, events, observer)
    }

    fn with_transport(
        device: Device,
        transport: Transport,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        observer: O,
    ) -> Self {
        Self {
            device,
            transport,
            events,
            observer,
            registry: None,
            decoder: MessageDecoder::new(),
            ready_fired: false,
        }
    }

    /// Report reachability of the device to `registry`.
    pub fn with_registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Handle for cancelling the connection from elsewhere.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Run until the connection is cancelled or fails. Gives the observer
    /// back so the caller can read whatever it collected.
    pub async fn run(mut self) -> Result<O, ProtocolError> {
        while let Some(event) = self.events.recv().await {
            match event {
                TransportEvent::State(state) => {
                    match state {
                        ConnectionState::Setup => {
                            tracing::trace!("Connecting to {}", self.device);
                        }
                        ConnectionState::Ready => self.on_ready(),
                        ConnectionState::Failed(error) => return Err(self.fail(error)),
                        ConnectionState::Cancelled => {
                            tracing::debug!("Connection to {} closed", self.device);
                            return Ok(self.observer);
                        }
                    }
                }
                TransportEvent::Sent(result) => {
                    if self.transport.is_cancelled() {
                        continue;
                    }
                    if let Err(e) = &result {
                        tracing::warn!("Send to {} failed: {}", self.device, e);
                    }
                    if self.observer.on_sent(&self.transport, &result) == Flow::Finish {
                        self.transport.cancel();
                    }
                }
                TransportEvent::Received(read) => {
                    if self.transport.is_cancelled() {
                        continue;
                    }
                    if let Err(error) = self.on_read(read) {
                        return Err(self.fail(error));
                    }
                }
            }
        }

        // The transport task ended without a terminal state.
        Ok(self.observer)
    }

    fn on_ready(&mut self) {
        if self.ready_fired || self.transport.is_cancelled() {
            return;
        }
        self.ready_fired = true;
        tracing::info!("Connection to {} ready", self.device);
        self.report(self.device.clone().reachable());

        if self.observer.on_ready(&self.transport) == Flow::Finish {
            self.transport.cancel();
        }
    }

    fn on_read(&mut self, read: ReadResult) -> Result<(), ProtocolError> {
        if let Some(error) = read.error {
            return Err(error);
        }

        let messages = self
            .decoder
            .feed(&read.bytes)
            .map_err(|e| ProtocolError::ReceiveFailed(e.to_string()))?;

        for message in messages {
            if self.transport.is_cancelled() {
                return Ok(());
            }
            if self.observer.on_message(&self.transport, message) == Flow::Finish {
                self.transport.cancel();
                return Ok(());
            }
        }

        if read.is_final {
            if self.decoder.has_partial_frame() {
                tracing::debug!("{} closed mid-frame", self.device);
            }
            self.transport.cancel();
        } else {
            self.transport.receive();
        }
        Ok(())
    }

    /// Terminal failure: cancel and tell the registry.
    fn fail(&mut self, error: ProtocolError) -> ProtocolError {
        tracing::warn!("Connection to {} failed: {}", self.device, error);
        self.transport.cancel();
        self.report(self.device.clone().unreachable(error.to_string()));
        error
    }

    fn report(&self, device: Device) {
        if let Some(registry) = &self.registry {
            registry.update(device);
        }
    }
}
