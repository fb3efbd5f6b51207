use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;
use tracing::{info, warn};

use super::{Connection, ConnectionOptions};
use crate::caps::Capabilities;
use crate::config::NetworkConfig;
use crate::error::{ConnectionError, ProtocolError};
use crate::line::LineCodec;
use crate::message::Message;

/// Cloneable reference to the upstream network connection.
#[derive(Clone)]
pub struct NetworkHandle {
    name: Arc<str>,
    capabilities: Capabilities,
    outbound: mpsc::Sender<Message>,
}

impl NetworkHandle {
    pub fn new(name: &str, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            name: Arc::from(name),
            capabilities: Capabilities::new(),
            outbound,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capabilities advertised and acknowledged by the network.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Queue a message for the network, waiting for room.
    pub async fn deliver(&self, message: Message) -> Result<(), ConnectionError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl fmt::Debug for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The three registration lines, in the order they are sent.
///
/// The realname always carries a leading `:`, even without spaces.
pub fn registration_lines(config: &NetworkConfig) -> [String; 3] {
    [
        "CAP LS 302".to_string(),
        format!("NICK {}", config.nick),
        format!("USER {} - - :{}", config.username, config.realname),
    ]
}

/// Write the registration lines to `stream` and flush.
pub async fn register<W>(stream: &mut W, config: &NetworkConfig) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    for line in registration_lines(config) {
        codec.encode(line.as_str(), &mut buf)?;
    }
    stream.write_all(&buf).await?;
    stream.flush().await?;
    Ok(())
}

/// Register on an already connected stream, then start its pumps.
pub async fn establish<S>(
    mut stream: S,
    config: &NetworkConfig,
) -> Result<(Connection, mpsc::Receiver<Message>), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    register(&mut stream, config)
        .await
        .map_err(ConnectionError::Register)?;
    info!(network = %config.name, nick = %config.nick, "registration sent");

    Ok(Connection::spawn(
        stream,
        ConnectionOptions::network(config.name.as_str()),
    ))
}

/// Connect to the network over TCP, register and start the pumps.
///
/// # Errors
///
/// Returns [`ConnectionError::Dial`] if the TCP connect fails and
/// [`ConnectionError::Register`] if the registration lines cannot be
/// written. No retry is attempted.
pub async fn dial(
    config: &NetworkConfig,
) -> Result<(Connection, mpsc::Receiver<Message>), ConnectionError> {
    let addr = config.address();
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| ConnectionError::Dial {
            addr: addr.clone(),
            source,
        })?;

    if let Err(e) = enable_keepalive(&stream) {
        warn!(network = %config.name, "failed to enable TCP keepalive: {}", e);
    }
    info!(network = %config.name, addr = %addr, "connected");

    establish(stream, config).await
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}
