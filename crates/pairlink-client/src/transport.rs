//! One TCP connection and its I/O task.
//!
//! All reads, writes and state changes of a transport run on a single spawned
//! task, so their completions reach the owner in the order the socket
//! produced them. The owner talks to the task through a cloneable
//! [`Transport`] handle and receives [`TransportEvent`]s on a channel.

use pairlink_core::framing::encode_frame;
use pairlink_core::{ConnectionState, ProtocolError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_READ_CHUNK: usize = 64 * 1024;

/// Transport tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound on the TCP handshake.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Largest chunk a single read may return.
    pub max_read_chunk: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_read_chunk: DEFAULT_MAX_READ_CHUNK,
        }
    }
}

/// Completion of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub bytes: Vec<u8>,
    /// The peer closed its side; no more bytes will arrive.
    pub is_final: bool,
    pub error: Option<ProtocolError>,
}

/// Everything a transport reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    State(ConnectionState),
    /// Completion of one `send`, in submission order.
    Sent(Result<(), ProtocolError>),
    /// Completion of one `receive`.
    Received(ReadResult),
}

enum Op {
    Send(Vec<u8>),
    Receive,
}

/// Handle to a transport's I/O task.
///
/// Once [`cancel`](Transport::cancel) has been called every operation on any
/// clone of the handle is a no-op. Cancellation bypasses the operation queue,
/// so it also interrupts a write the peer is not draining.
#[derive(Debug, Clone)]
pub struct Transport {
    ops: mpsc::UnboundedSender<Op>,
    cancel: Arc<watch::Sender<bool>>,
    label: Arc<str>,
}

impl Transport {
    /// Start connecting to `addr`.
    ///
    /// The first event is always `State(Setup)`, followed by `State(Ready)` or
    /// `State(Failed(ConnectFailed))`. Sends and receives issued before ready
    /// are held until the handshake completes.
    pub fn start(
        addr: impl Into<String>,
        config: &TransportConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let addr = addr.into();
        let (handle, ops_rx, events_tx, events_rx) = Self::channels(&addr);

        let config = config.clone();
        let mut cancel = handle.cancel.subscribe();
        tokio::spawn(async move {
            let _ = events_tx.send(TransportEvent::State(ConnectionState::Setup));
            if let Some((stream, queued, ops_rx)) =
                connect(&addr, &config, ops_rx, &mut cancel, &events_tx).await
            {
                if *cancel.borrow() {
                    let _ = events_tx.send(TransportEvent::State(ConnectionState::Cancelled));
                    return;
                }
                tracing::debug!("Connected to {}", addr);
                let _ = events_tx.send(TransportEvent::State(ConnectionState::Ready));
                io_loop(stream, &config, queued, ops_rx, cancel, events_tx).await;
            }
        });

        (handle, events_rx)
    }

    /// Wrap an already-accepted stream. The first event is `State(Ready)`.
    pub fn from_stream(
        stream: TcpStream,
        config: &TransportConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let label = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        let (handle, ops_rx, events_tx, events_rx) = Self::channels(&label);

        let config = config.clone();
        let cancel = handle.cancel.subscribe();
        tokio::spawn(async move {
            let _ = events_tx.send(TransportEvent::State(ConnectionState::Ready));
            io_loop(stream, &config, VecDeque::new(), ops_rx, cancel, events_tx).await;
        });

        (handle, events_rx)
    }

    #[allow(clippy::type_complexity)]
    fn channels(
        label: &str,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Op>,
        mpsc::UnboundedSender<TransportEvent>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = Self {
            ops: ops_tx,
            cancel: Arc::new(watch::Sender::new(false)),
            label: Arc::from(label),
        };
        (handle, ops_rx, events_tx, events_rx)
    }

    /// Frame `text` as UTF-8 and submit it as one write.
    ///
    /// The write completes later as a `Sent` event. Only framing errors are
    /// returned here.
    pub fn send(&self, text: &str) -> Result<(), ProtocolError> {
        if self.is_cancelled() {
            return Ok(());
        }
        let frame = encode_frame(text.as_bytes())?;
        tracing::trace!("--> {} ({} bytes) to {}", preview(text), frame.len(), self.label);
        let _ = self.ops.send(Op::Send(frame));
        Ok(())
    }

    /// Issue one read. Completes as a `Received` event.
    pub fn receive(&self) {
        if !self.is_cancelled() {
            let _ = self.ops.send(Op::Receive);
        }
    }

    /// Tear the connection down. The task reports `State(Cancelled)` and
    /// exits.
    pub fn cancel(&self) {
        let first = self.cancel.send_if_modified(|cancelled| !std::mem::replace(cancelled, true));
        if first {
            tracing::trace!("Cancelling transport to {}", self.label);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// The remote address, for diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(32) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Resolves once the transport is cancelled or every handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// Resolve and connect, holding early operations until the handshake is done.
///
/// Returns `None` when the attempt failed or was cancelled; the terminal state
/// has then already been reported.
async fn connect(
    addr: &str,
    config: &TransportConfig,
    mut ops: mpsc::UnboundedReceiver<Op>,
    cancel: &mut watch::Receiver<bool>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<(TcpStream, VecDeque<Op>, mpsc::UnboundedReceiver<Op>)> {
    let attempt = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr));
    tokio::pin!(attempt);
    let mut queued = VecDeque::new();

    loop {
        tokio::select! {
            result = &mut attempt => {
                let error = match result {
                    Ok(Ok(stream)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::trace!("set_nodelay on {} failed: {}", addr, e);
                        }
                        return Some((stream, queued, ops));
                    }
                    Ok(Err(e)) => ProtocolError::ConnectFailed(e.to_string()),
                    Err(_) => ProtocolError::ConnectFailed(format!(
                        "timed out after {:?}",
                        config.connect_timeout
                    )),
                };
                let _ = events.send(TransportEvent::State(ConnectionState::Failed(error)));
                return None;
            }
            _ = cancelled(cancel) => {
                let _ = events.send(TransportEvent::State(ConnectionState::Cancelled));
                return None;
            }
            op = ops.recv() => match op {
                Some(op) => queued.push_back(op),
                None => {
                    let _ = events.send(TransportEvent::State(ConnectionState::Cancelled));
                    return None;
                }
            }
        }
    }
}

enum Step {
    Op(Option<Op>),
    Read(std::io::Result<usize>),
}

async fn io_loop(
    stream: TcpStream,
    config: &TransportConfig,
    mut queued: VecDeque<Op>,
    mut ops: mpsc::UnboundedReceiver<Op>,
    mut cancel: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; config.max_read_chunk.max(1)];
    let mut reading = false;

    loop {
        if *cancel.borrow() {
            break;
        }
        let step = match queued.pop_front() {
            Some(op) => Step::Op(Some(op)),
            None => tokio::select! {
                _ = cancelled(&mut cancel) => break,
                op = ops.recv() => Step::Op(op),
                result = reader.read(&mut buf), if reading => Step::Read(result),
            },
        };

        let event = match step {
            Step::Op(Some(Op::Send(frame))) => {
                let result = tokio::select! {
                    _ = cancelled(&mut cancel) => break,
                    result = writer.write_all(&frame) => result,
                };
                TransportEvent::Sent(result.map_err(|e| ProtocolError::SendFailed(e.to_string())))
            }
            Step::Op(Some(Op::Receive)) => {
                reading = true;
                continue;
            }
            Step::Op(None) => break,
            Step::Read(result) => {
                reading = false;
                TransportEvent::Received(match result {
                    Ok(0) => ReadResult {
                        bytes: Vec::new(),
                        is_final: true,
                        error: None,
                    },
                    Ok(n) => ReadResult {
                        bytes: buf[..n].to_vec(),
                        is_final: false,
                        error: None,
                    },
                    Err(e) => ReadResult {
                        bytes: Vec::new(),
                        is_final: false,
                        error: Some(ProtocolError::ReceiveFailed(e.to_string())),
                    },
                })
            }
        };

        if events.send(event).is_err() {
            // Owner went away.
            break;
        }
    }

    let _ = writer.shutdown().await;
    let _ = events.send(TransportEvent::State(ConnectionState::Cancelled));
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
