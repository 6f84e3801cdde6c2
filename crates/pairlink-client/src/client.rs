//! Initiator side: one fresh connection per exchange.

use crate::connection::{Connection, ConnectionObserver, Flow};
use crate::store::DeviceRegistry;
use crate::transport::{Transport, TransportConfig};
use pairlink_core::{
    Command, Device, Message, NotificationPayload, PeripheralRecord, PeripheralSyncPayload,
    ProtocolError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Written to the peer; no reply is expected.
    Delivered,
    /// The peer replied `operationSuccess`.
    Succeeded,
    /// The peer replied `operationFailed`.
    Failed,
}

/// Error performing an exchange.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no response from {device} within {timeout:?}")]
    Timeout { device: String, timeout: Duration },
    #[error("{0} closed the connection before replying")]
    Closed(String),
}

/// Client tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub transport: TransportConfig,
    /// Time allowed for the peer to reply once connected.
    #[serde(with = "crate::transport::duration_secs")]
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

/// Sends commands to paired devices.
#[derive(Clone, Default)]
pub struct Client {
    config: ClientConfig,
    registry: Option<Arc<dyn DeviceRegistry>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    /// Report reachability of every contacted device to `registry`.
    pub fn with_registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Show a notification on `device`. Fire-and-forget: the peer never
    /// replies, so success means the bytes were written.
    pub async fn send_notification(
        &self,
        device: &Device,
        title: &str,
        body: &str,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let payload = NotificationPayload::new(title, body).encode()?;
        self.exchange(
            device,
            Exchange::new(vec![Command::Notification.to_string(), payload], false),
        )
        .await
    }

    /// Replace the peripheral list on `device`.
    pub async fn sync_peripherals(
        &self,
        device: &Device,
        peripherals: &[PeripheralRecord],
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let payload = PeripheralSyncPayload::new(peripherals.to_vec()).encode()?;
        self.exchange(
            device,
            Exchange::new(vec![Command::SyncPeripherals.to_string(), payload], true),
        )
        .await
    }

    /// Ask `device` to connect all of its peripherals.
    pub async fn connect_all(&self, device: &Device) -> Result<ExchangeOutcome, ExchangeError> {
        self.exchange(device, Exchange::new(vec![Command::ConnectAll.to_string()], true))
            .await
    }

    /// Ask `device` to unregister all of its peripherals.
    pub async fn unregister_all(&self, device: &Device) -> Result<ExchangeOutcome, ExchangeError> {
        self.exchange(device, Exchange::new(vec![Command::UnregisterAll.to_string()], true))
            .await
    }

    async fn exchange(
        &self,
        device: &Device,
        exchange: Exchange,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let mut connection = Connection::connect(device.clone(), &self.config.transport, exchange);
        if let Some(registry) = &self.registry {
            connection = connection.with_registry(registry.clone());
        }
        let transport = connection.transport().clone();

        // The transport bounds the handshake itself; this bounds the rest.
        let deadline = self.config.transport.connect_timeout + self.config.response_timeout;
        match tokio::time::timeout(deadline, connection.run()).await {
            Ok(Ok(exchange)) => exchange.finish(device),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                transport.cancel();
                tracing::warn!("{} did not reply within {:?}", device, deadline);
                Err(ExchangeError::Timeout {
                    device: device.to_string(),
                    timeout: deadline,
                })
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("registry", &self.registry.is_some())
            .finish()
    }
}

/// Observer for one request: send the messages, then wait for a reply.
#[derive(Debug)]
struct Exchange {
    messages: Vec<String>,
    await_reply: bool,
    unsent: usize,
    outcome: Option<ExchangeOutcome>,
    error: Option<ProtocolError>,
}

impl Exchange {
    fn new(messages: Vec<String>, await_reply: bool) -> Self {
        Self {
            unsent: messages.len(),
            messages,
            await_reply,
            outcome: None,
            error: None,
        }
    }

    fn finish(self, device: &Device) -> Result<ExchangeOutcome, ExchangeError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        self.outcome
            .ok_or_else(|| ExchangeError::Closed(device.to_string()))
    }
}

impl ConnectionObserver for Exchange {
    fn on_ready(&mut self, transport: &Transport) -> Flow {
        for message in &self.messages {
            if let Err(e) = transport.send(message) {
                self.error = Some(e);
                return Flow::Finish;
            }
        }
        if self.await_reply {
            transport.receive();
        }
        Flow::Continue
    }

    fn on_sent(&mut self, _transport: &Transport, result: &Result<(), ProtocolError>) -> Flow {
        if let Err(e) = result {
            self.error = Some(e.clone());
            return Flow::Finish;
        }
        self.unsent = self.unsent.saturating_sub(1);
        if self.unsent == 0 && !self.await_reply {
            self.outcome = Some(ExchangeOutcome::Delivered);
            return Flow::Finish;
        }
        Flow::Continue
    }

    fn on_message(&mut self, transport: &Transport, message: Message) -> Flow {
        let outcome = match message {
            Message::Command(command) if command.is_response() => {
                if command == Command::OperationSuccess {
                    ExchangeOutcome::Succeeded
                } else {
                    ExchangeOutcome::Failed
                }
            }
            other => {
                tracing::debug!("Ignoring {:?} from {} while awaiting a reply", other, transport.label());
                return Flow::Continue;
            }
        };
        self.outcome = Some(outcome);
        Flow::Finish
    }
}
