//! Ordered chains of concurrently running middleware stages.
//!
//! A [`Pipeline`] holds two independent [`Chain`]s built from the same
//! ordered list of [`Middleware`]: one for upstream envelopes and one for
//! downstream envelopes. Each stage runs on its own task and is linked to
//! the next by a one-slot channel:
//!
//! ```text
//! In -> [stage 0] -> [stage 1] -> ... -> [stage n-1] -> Out
//! ```
//!
//! A stage forwards everything produced for one envelope before it takes
//! the next, so envelopes leave `Out` in the order they entered `In`.
//! Dropping every sender for `In` closes the chain: each stage drains its
//! input, closes its output and exits, until `Out` reports closed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info_span, Instrument};

use crate::connection::DEFAULT_CHANNEL_CAPACITY;
use crate::middleware::{Downstream, Middleware, Upstream};

/// A single step of a [`Chain`].
///
/// [`Middleware`] is adapted to this per direction; tests and callers
/// outside the bouncer can implement it for any item type.
pub trait Stage<T>: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Zero or more items to forward, in order.
    fn process(&self, item: T) -> Vec<T>;
}

struct UpstreamStage(Arc<dyn Middleware>);

impl Stage<Upstream> for UpstreamStage {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn process(&self, item: Upstream) -> Vec<Upstream> {
        self.0.process_upstream(item)
    }
}

struct DownstreamStage(Arc<dyn Middleware>);

impl Stage<Downstream> for DownstreamStage {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn process(&self, item: Downstream) -> Vec<Downstream> {
        self.0.process_downstream(item)
    }
}

/// Handles of a chain's stage tasks.
#[derive(Debug, Default)]
pub struct Workers {
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Number of stage tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every stage task to exit.
    ///
    /// Stages exit once their input is closed and drained, so this only
    /// returns after `In` was closed. Reports the first stage that
    /// panicked.
    pub async fn join(self) -> Result<(), JoinError> {
        let mut result = Ok(());
        for handle in self.handles {
            if let Err(err) = handle.await {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

/// One direction of a pipeline.
#[derive(Debug)]
pub struct Chain<T> {
    input: mpsc::Sender<T>,
    output: mpsc::Receiver<T>,
    workers: Workers,
}

impl<T: Send + 'static> Chain<T> {
    /// Link `stages` in order and spawn one task per stage.
    ///
    /// With no stages, `In` feeds `Out` directly.
    pub fn new(direction: &'static str, stages: Vec<Arc<dyn Stage<T>>>) -> Self {
        let (input, mut output) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let mut handles = Vec::with_capacity(stages.len());

        for (index, stage) in stages.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
            let span = info_span!("stage", direction, index, name = stage.name());
            let upstream_rx = std::mem::replace(&mut output, rx);
            handles.push(tokio::spawn(run_stage(stage, upstream_rx, tx).instrument(span)));
        }

        Self {
            input,
            output,
            workers: Workers { handles },
        }
    }

    /// Another sender onto `In`.
    pub fn sender(&self) -> mpsc::Sender<T> {
        self.input.clone()
    }

    /// Push an item into `In`, waiting for the first stage to take it.
    pub async fn send(&self, item: T) -> Result<(), mpsc::error::SendError<T>> {
        self.input.send(item).await
    }

    /// Next item from `Out`, or `None` once the chain has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.output.recv().await
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Take the chain apart into `In`, `Out` and its stage tasks.
    pub fn into_parts(self) -> (mpsc::Sender<T>, mpsc::Receiver<T>, Workers) {
        (self.input, self.output, self.workers)
    }

    /// Close `In`, collect whatever still reaches `Out`, and wait for the
    /// stages to exit.
    ///
    /// Waits for every sender handed out by [`sender`](Self::sender) to be
    /// dropped as well.
    pub async fn join(self) -> Result<Vec<T>, JoinError> {
        let (input, mut output, workers) = self.into_parts();
        drop(input);

        let mut rest = Vec::new();
        while let Some(item) = output.recv().await {
            rest.push(item);
        }
        workers.join().await?;
        Ok(rest)
    }
}

async fn run_stage<T>(stage: Arc<dyn Stage<T>>, mut input: mpsc::Receiver<T>, output: mpsc::Sender<T>)
where
    T: Send + 'static,
{
    while let Some(item) = input.recv().await {
        for out in stage.process(item) {
            if output.send(out).await.is_err() {
                debug!("output closed, stopping stage");
                return;
            }
        }
    }
    debug!("input closed, stopping stage");
}

/// Upstream and downstream chains built from one middleware list.
#[derive(Debug)]
pub struct Pipeline {
    pub upstream: Chain<Upstream>,
    pub downstream: Chain<Downstream>,
}

impl Pipeline {
    /// Build both chains from `middleware`, first element nearest `In`.
    pub fn new(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        let upstream = middleware
            .iter()
            .map(|m| Arc::new(UpstreamStage(Arc::clone(m))) as Arc<dyn Stage<Upstream>>)
            .collect();
        let downstream = middleware
            .into_iter()
            .map(|m| Arc::new(DownstreamStage(m)) as Arc<dyn Stage<Downstream>>)
            .collect();

        Self {
            upstream: Chain::new("upstream", upstream),
            downstream: Chain::new("downstream", downstream),
        }
    }

    /// Close both chains and wait for every stage, returning what was
    /// still in flight.
    pub async fn join(self) -> Result<(Vec<Upstream>, Vec<Downstream>), JoinError> {
        let (upstream, downstream) = tokio::join!(self.upstream.join(), self.downstream.join());
        Ok((upstream?, downstream?))
    }
}
