use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::caps::Capabilities;
use crate::error::ConnectionError;
use crate::message::Message;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a downstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

struct ClientInner {
    id: ClientId,
    capabilities: Capabilities,
    outbound: mpsc::Sender<Message>,
}

/// Cheap, cloneable reference to an attached client.
///
/// Carries the client's capability store and the input of its write pump.
/// Two handles are equal when they refer to the same client.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<ClientInner>,
}

impl ClientHandle {
    pub fn new(id: ClientId, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                id,
                capabilities: Capabilities::new(),
                outbound,
            }),
        }
    }

    pub fn id(&self) -> ClientId {
        self.inner.id
    }

    /// Capabilities negotiated between this client and the bouncer.
    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    /// Queue a message without waiting.
    ///
    /// Fails if the client's buffer is full or its write pump is gone.
    pub fn try_deliver(&self, message: Message) -> Result<(), TrySendError<Message>> {
        self.inner.outbound.try_send(message)
    }

    /// Queue a message, waiting for buffer room.
    pub async fn deliver(&self, message: Message) -> Result<(), ConnectionError> {
        self.inner
            .outbound
            .send(message)
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.outbound.is_closed()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ClientHandle {}

impl Hash for ClientHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}
