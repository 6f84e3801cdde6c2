//! Responder side: accept connections and run commands.

use crate::connection::{Connection, ConnectionObserver, Flow};
use crate::handlers::Handlers;
use crate::transport::{Transport, TransportConfig};
use pairlink_core::{Device, Dispatcher, Message};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// One accepted connection: dispatcher state plus the handlers it feeds.
///
/// The pending command lives here, so it is never shared between
/// connections.
#[derive(Debug)]
pub struct Session {
    handlers: Handlers,
    dispatcher: Dispatcher,
    handled: usize,
}

impl Session {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers,
            dispatcher: Dispatcher::new(),
            handled: 0,
        }
    }

    /// Invocations completed on this connection.
    pub fn handled(&self) -> usize {
        self.handled
    }
}

impl ConnectionObserver for Session {
    fn on_ready(&mut self, transport: &Transport) -> Flow {
        transport.receive();
        Flow::Continue
    }

    fn on_message(&mut self, transport: &Transport, message: Message) -> Flow {
        let Some(invocation) = self.dispatcher.dispatch(message) else {
            return Flow::Continue;
        };

        tracing::debug!("Running {} from {}", invocation.command, transport.label());
        self.handled += 1;
        if let Some(reply) = self.handlers.handle(invocation) {
            if let Err(e) = transport.send(reply.as_str()) {
                tracing::warn!("Could not reply {} to {}: {}", reply, transport.label(), e);
            }
        }
        Flow::Continue
    }
}

/// Accept connections forever, one task per connection.
pub async fn serve(
    listener: TcpListener,
    handlers: Handlers,
    config: TransportConfig,
) -> std::io::Result<()> {
    tracing::info!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        let session = Session::new(handlers.clone());
        let connection = Connection::accepted(stream, peer_device(addr), &config, session);

        tokio::spawn(async move {
            match connection.run().await {
                Ok(session) => {
                    tracing::debug!("Session with {} ended after {} command(s)", addr, session.handled())
                }
                Err(e) => tracing::warn!("Session with {} failed: {}", addr, e),
            }
        });
    }
}

fn peer_device(addr: SocketAddr) -> Device {
    Device::new(addr.to_string(), addr.ip().to_string(), addr.port())
}
