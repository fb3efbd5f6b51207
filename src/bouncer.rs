//! Wiring of one network connection, its clients, and a pipeline.
//!
//! The bouncer runs as a handful of tasks that only talk over channels:
//!
//! - the **router** owns the set of attached clients. It wraps every
//!   message from the network in a [`Downstream`] envelope addressed to
//!   the clients attached at that moment and feeds the downstream chain.
//! - the **fan-out** task drains the downstream chain and queues each
//!   message on every addressed client without waiting. A client whose
//!   buffer is full loses that line; the others are unaffected.
//! - the **upstream delivery** task drains the upstream chain into the
//!   network's write pump.
//! - one **forwarder** per client turns the client's lines into
//!   [`Upstream`] envelopes and, once the client goes away, detaches and
//!   closes it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::NetworkConfig;
use crate::connection::{ClientHandle, ClientId, Connection, ConnectionOptions, NetworkHandle};
use crate::error::ConnectionError;
use crate::message::Message;
use crate::middleware::{Downstream, Middleware, Upstream};
use crate::pipeline::{Pipeline, Workers};

/// Capacity of the router's attach/detach queue.
const CONTROL_CAPACITY: usize = 16;

#[derive(Debug)]
enum Control {
    Attach(ClientHandle),
    Detach(ClientId),
}

/// A running bouncer for one network.
pub struct Bouncer {
    network: NetworkHandle,
    network_conn: Connection,
    client_buffer: usize,
    control: mpsc::Sender<Control>,
    upstream: mpsc::Sender<Upstream>,
    shutdown: watch::Sender<()>,
    network_alive: watch::Receiver<()>,
    tasks: JoinSet<()>,
    workers: Vec<Workers>,
}

impl Bouncer {
    /// Start routing for an established network connection.
    ///
    /// `from_network` is the network connection's read pump output.
    /// Spawns tasks, so it must be called from within a Tokio runtime.
    pub fn start(
        config: &NetworkConfig,
        network_conn: Connection,
        from_network: mpsc::Receiver<Message>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        let network = NetworkHandle::new(&config.name, network_conn.sender());
        let pipeline = Pipeline::new(middleware);
        let (upstream_in, upstream_out, upstream_workers) = pipeline.upstream.into_parts();
        let (downstream_in, downstream_out, downstream_workers) =
            pipeline.downstream.into_parts();

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(());
        let (alive_tx, alive_rx) = watch::channel(());

        let mut tasks = JoinSet::new();
        let span = info_span!("bouncer", network = %config.name);

        tasks.spawn(
            route(
                network.clone(),
                from_network,
                control_rx,
                downstream_in,
                alive_tx,
            )
            .instrument(span.clone()),
        );
        tasks.spawn(fan_out(downstream_out).instrument(span.clone()));
        tasks.spawn(deliver_upstream(upstream_out).instrument(span));

        info!(network = %config.name, "bouncer started");

        Self {
            network,
            network_conn,
            client_buffer: config.client_buffer.max(1),
            control: control_tx,
            upstream: upstream_in,
            shutdown: shutdown_tx,
            network_alive: alive_rx,
            tasks,
            workers: vec![upstream_workers, downstream_workers],
        }
    }

    /// The network this bouncer is attached to.
    pub fn network(&self) -> &NetworkHandle {
        &self.network
    }

    /// Attach a downstream client connected over `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the router has stopped, for
    /// example because the network went away.
    pub async fn attach<S>(&mut self, stream: S) -> Result<ClientHandle, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = ClientId::next();
        let options = ConnectionOptions::client(id.to_string()).with_buffer(self.client_buffer);
        let (conn, from_client) = Connection::spawn(stream, options);
        let client = ClientHandle::new(id, conn.sender());

        if self.control.send(Control::Attach(client.clone())).await.is_err() {
            // Nothing will route to this client; let it go cleanly.
            let _ = conn.close().await;
            return Err(ConnectionError::Closed);
        }

        let span = info_span!("client", client = %id);
        self.tasks.spawn(
            forward_client(
                conn,
                client.clone(),
                from_client,
                self.network.clone(),
                self.upstream.clone(),
                self.control.clone(),
                self.shutdown.subscribe(),
            )
            .instrument(span),
        );

        info!(client = %id, "client attached");
        Ok(client)
    }

    /// Resolves once the network stream has ended and routing stopped.
    pub async fn network_closed(&mut self) {
        while self.network_alive.changed().await.is_ok() {}
    }

    /// Close every connection and wait for every task.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the network connection's close, if
    /// any. Client close errors and task panics are logged.
    pub async fn shutdown(mut self) -> Result<(), ConnectionError> {
        info!(network = %self.network.name(), "shutting down");

        drop(self.shutdown);
        drop(self.upstream);
        drop(self.control);

        let result = self.network_conn.close().await;

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "bouncer task failed");
            }
        }
        for workers in self.workers {
            if let Err(err) = workers.join().await {
                warn!(error = %err, "pipeline stage failed");
            }
        }

        debug!("bouncer stopped");
        result
    }
}

async fn route(
    network: NetworkHandle,
    mut from_network: mpsc::Receiver<Message>,
    mut control: mpsc::Receiver<Control>,
    downstream: mpsc::Sender<Downstream>,
    _alive: watch::Sender<()>,
) {
    let mut clients: BTreeMap<ClientId, ClientHandle> = BTreeMap::new();

    loop {
        tokio::select! {
            // Attach and detach take effect before the next network line.
            biased;
            Some(event) = control.recv() => match event {
                Control::Attach(client) => {
                    clients.insert(client.id(), client);
                }
                Control::Detach(id) => {
                    clients.remove(&id);
                }
            },
            message = from_network.recv() => {
                let Some(message) = message else {
                    info!("network stream ended");
                    break;
                };
                let envelope = Downstream::new(
                    message,
                    clients.values().cloned().collect(),
                    network.clone(),
                );
                if downstream.send(envelope).await.is_err() {
                    debug!("downstream chain closed");
                    break;
                }
            }
        }
    }
}

async fn fan_out(mut from_pipeline: mpsc::Receiver<Downstream>) {
    while let Some(envelope) = from_pipeline.recv().await {
        for client in &envelope.clients {
            match client.try_deliver(envelope.message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        client = %client.id(),
                        command = %envelope.message.command,
                        "client buffer full, dropping line"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = %client.id(), "client gone, skipping");
                }
            }
        }
    }
}

async fn deliver_upstream(mut from_pipeline: mpsc::Receiver<Upstream>) {
    while let Some(envelope) = from_pipeline.recv().await {
        let command = envelope.message.command.clone();
        if let Err(err) = envelope.network.deliver(envelope.message).await {
            warn!(error = %err, command = %command, "dropping line for network");
        }
    }
}

async fn forward_client(
    conn: Connection,
    client: ClientHandle,
    mut from_client: mpsc::Receiver<Message>,
    network: NetworkHandle,
    upstream: mpsc::Sender<Upstream>,
    control: mpsc::Sender<Control>,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        let message = tokio::select! {
            message = from_client.recv() => message,
            _ = shutdown.changed() => break,
        };
        let Some(message) = message else {
            info!("client disconnected");
            break;
        };

        let envelope = Upstream::new(message, client.clone(), network.clone());
        tokio::select! {
            sent = upstream.send(envelope) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    let _ = control.send(Control::Detach(client.id())).await;
    if let Err(err) = conn.close().await {
        warn!(error = %err, "client close failed");
    }
}
