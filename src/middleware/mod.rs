//! Middleware stages and the envelopes they process.
//!
//! A [`Middleware`] sees each message wrapped in an [`Upstream`] envelope
//! on its way from a client to the network, or in a [`Downstream`]
//! envelope on its way from the network to the clients. Each call may return zero, one or many envelopes, so a
//! stage can drop, pass through, duplicate or rewrite traffic.
//!
//! Stages are plain values chosen when the
//! [`Pipeline`](crate::pipeline::Pipeline) is built:
//!
//! ```
//! use std::sync::Arc;
//! use bounce::middleware::{CapTracker, Middleware, Null};
//!
//! let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(CapTracker), Arc::new(Null)];
//! assert_eq!(stages[0].name(), "cap-tracker");
//! ```

mod cap_tracker;
mod null;

pub use self::cap_tracker::CapTracker;
pub use self::null::Null;

use crate::connection::{ClientHandle, NetworkHandle};
use crate::message::Message;

/// A message travelling from a client towards the network.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub message: Message,
    /// The client the message came from.
    pub client: ClientHandle,
    pub network: NetworkHandle,
}

/// A message travelling from the network towards clients.
#[derive(Debug, Clone)]
pub struct Downstream {
    pub message: Message,
    /// Clients the message will be delivered to.
    pub clients: Vec<ClientHandle>,
    pub network: NetworkHandle,
}

impl Upstream {
    pub fn new(message: Message, client: ClientHandle, network: NetworkHandle) -> Self {
        Self {
            message,
            client,
            network,
        }
    }
}

impl Downstream {
    pub fn new(message: Message, clients: Vec<ClientHandle>, network: NetworkHandle) -> Self {
        Self {
            message,
            clients,
            network,
        }
    }
}

/// One pipeline stage.
///
/// Both methods run on the stage's own task, one envelope at a time, and
/// must not block. Returned envelopes are forwarded in order.
pub trait Middleware: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Process a client to network envelope.
    fn process_upstream(&self, envelope: Upstream) -> Vec<Upstream>;

    /// Process a network to client envelope.
    fn process_downstream(&self, envelope: Downstream) -> Vec<Downstream>;
}
