//! Connection wrappers around a single byte stream.
//!
//! A [`Connection`] owns one stream and runs two tasks over it:
//!
//! - a **read pump** that frames lines, parses them and sends each
//!   [`Message`] on its output channel, closing that channel on EOF or a
//!   read error;
//! - a **write pump** that takes messages from its input channel in
//!   arrival order and writes them, shutting the write half down once the
//!   input is closed.
//!
//! Both roles, client-facing and network-facing, share this design. The
//! network-facing side additionally registers before its pumps start, see
//! [`establish`] and [`dial`].

mod client;
mod network;

pub use self::client::{ClientHandle, ClientId};
pub use self::network::{dial, establish, register, registration_lines, NetworkHandle};

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info_span, trace, warn, Instrument};

use crate::error::{ConnectionError, ProtocolError};
use crate::irc::IrcCodec;
use crate::message::Message;

/// Capacity of pump and pipeline channels.
///
/// One slot keeps handoffs as close to synchronous as a bounded channel
/// allows, so a slow consumer stalls its producer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// How long [`Connection::close`] lets the write pump drain.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which side of the bouncer a connection faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A downstream IRC client connected to the bouncer.
    Client,
    /// The upstream IRC network the bouncer is connected to.
    Network,
}

impl Role {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Network => "network",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`Connection::spawn`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Which side this connection faces.
    pub role: Role,
    /// Label attached to the pump spans.
    pub label: String,
    /// Capacity of the write pump's input channel.
    pub buffer: usize,
    /// Grace period for draining queued lines on close.
    pub close_timeout: Duration,
}

impl ConnectionOptions {
    /// Options for a client-facing connection.
    pub fn client(label: impl Into<String>) -> Self {
        Self {
            role: Role::Client,
            label: label.into(),
            buffer: DEFAULT_CHANNEL_CAPACITY,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Options for a network-facing connection.
    pub fn network(label: impl Into<String>) -> Self {
        Self {
            role: Role::Network,
            label: label.into(),
            buffer: DEFAULT_CHANNEL_CAPACITY,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Set the write pump's input capacity. Zero is raised to one.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Set how long `close` waits for queued lines to be written.
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }
}

/// A running connection: a stream plus its read and write pumps.
///
/// Dropping a `Connection` without calling [`close`](Self::close) still
/// stops both pumps, but nothing waits for them.
pub struct Connection {
    role: Role,
    label: String,
    close_timeout: Duration,
    outbound: mpsc::Sender<Message>,
    shutdown: watch::Sender<()>,
    reader: JoinHandle<()>,
    writer: JoinHandle<Result<(), ProtocolError>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("label", &self.label)
            .field("closed", &self.outbound.is_closed())
            .finish()
    }
}

impl Connection {
    /// Split `stream` and start both pumps.
    ///
    /// Returns the connection and the read pump's output. The output
    /// yields `None` once the peer closes the stream, a read fails, or the
    /// connection is closed.
    pub fn spawn<S>(stream: S, options: ConnectionOptions) -> (Self, mpsc::Receiver<Message>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (inbound_tx, inbound_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(options.buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let span = info_span!("connection", role = %options.role, label = %options.label);

        let reader = tokio::spawn(
            read_pump(
                FramedRead::new(read_half, IrcCodec::new()),
                inbound_tx,
                shutdown_rx.clone(),
            )
            .instrument(span.clone()),
        );
        let writer = tokio::spawn(
            write_pump(
                FramedWrite::new(write_half, IrcCodec::new()),
                outbound_rx,
                shutdown_rx,
            )
            .instrument(span),
        );

        debug!(role = %options.role, label = %options.label, "connection started");

        let connection = Self {
            role: options.role,
            label: options.label,
            close_timeout: options.close_timeout,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            reader,
            writer,
        };
        (connection, inbound_rx)
    }

    /// Which side this connection faces.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The label given at spawn time.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// A sender feeding the write pump.
    pub fn sender(&self) -> mpsc::Sender<Message> {
        self.outbound.clone()
    }

    /// Whether the write pump has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Queue a message for the write pump, waiting for room.
    pub async fn send(&self, message: Message) -> Result<(), ConnectionError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Close the connection and wait for both pumps.
    ///
    /// The write pump writes whatever is already queued before shutting
    /// the stream down; the read pump stops without reading further. A
    /// peer that stops reading gets the close timeout to catch up, after
    /// which the write pump is aborted and the stream dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Write`] if the write pump stopped on a
    /// write failure, [`ConnectionError::DrainTimeout`] if it was aborted,
    /// or [`ConnectionError::Task`] if a pump panicked.
    pub async fn close(self) -> Result<(), ConnectionError> {
        let Connection {
            role,
            label,
            close_timeout,
            outbound,
            shutdown,
            reader,
            mut writer,
        } = self;

        drop(outbound);
        drop(shutdown);

        let mut result = match tokio::time::timeout(close_timeout, &mut writer).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(ConnectionError::Write(err)),
            Ok(Err(err)) => Err(ConnectionError::Task(err.to_string())),
            Err(_) => {
                warn!(role = %role, label = %label, "write pump stalled, aborting");
                writer.abort();
                // Cancellation is the expected outcome here.
                let _ = writer.await;
                Err(ConnectionError::DrainTimeout(close_timeout))
            }
        };
        if let Err(err) = reader.await {
            if result.is_ok() {
                result = Err(ConnectionError::Task(err.to_string()));
            }
        }

        debug!(role = %role, label = %label, "connection closed");
        result
    }
}

async fn read_pump<R>(
    mut frames: FramedRead<R, IrcCodec>,
    output: mpsc::Sender<Message>,
    mut shutdown: watch::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            next = frames.next() => next,
            _ = shutdown.changed() => {
                debug!("read pump stopped by close");
                break;
            }
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                warn!(error = %err, "read failed");
                break;
            }
            None => {
                debug!("stream closed by peer");
                break;
            }
        };

        // A full output must not keep close() waiting.
        tokio::select! {
            sent = output.send(message) => {
                if sent.is_err() {
                    debug!("read pump output dropped");
                    break;
                }
            }
            _ = shutdown.changed() => {
                debug!("read pump stopped by close");
                break;
            }
        }
    }
}

async fn write_pump<W>(
    mut sink: FramedWrite<W, IrcCodec>,
    mut input: mpsc::Receiver<Message>,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut closing = false;
    let result = loop {
        let next = if closing {
            input.recv().await
        } else {
            tokio::select! {
                next = input.recv() => next,
                _ = shutdown.changed() => {
                    // Other handles may still hold senders.
                    input.close();
                    closing = true;
                    continue;
                }
            }
        };

        let Some(message) = next else {
            break Ok(());
        };
        trace!(command = %message.command, "sending line");
        if let Err(err) = sink.send(message).await {
            warn!(error = %err, "write failed");
            break Err(err);
        }
    };

    let closed = sink.close().await;
    debug!("write pump stopped");
    result.and(closed)
}
