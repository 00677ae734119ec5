//! Capabilities a concrete action supplies to the executor.
//!
//! An action is assembled from a [`ResourceLoader`] (run once in INITIALIZING),
//! a [`TaskBody`] (run in RUNNING) and a [`RecoveryStep`] (run in RECOVERING).
//! Finished results can be forwarded to any number of [`ResultSink`]s.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ActionError;
use crate::result::ActionResult;

/// Acquires the resource the task body works with (e.g. a loaded model).
pub trait ResourceLoader: Send + Sync {
    type Handle: Send + Sync;

    fn load(&self) -> impl Future<Output = Result<Self::Handle, ActionError>> + Send;
}

/// The domain-specific work done while RUNNING.
///
/// A body that completes unsuccessfully reports it as `Err`; only `Ok` can
/// lead to DONE.
pub trait TaskBody<G, H>: Send + Sync {
    type Payload: Send;

    fn run(
        &self,
        goal: &G,
        handle: &H,
    ) -> impl Future<Output = Result<Self::Payload, ActionError>> + Send;
}

/// The bounded recovery action performed between two RUNNING attempts.
pub trait RecoveryStep<H>: Send + Sync {
    fn recover(&self, handle: H) -> impl Future<Output = Result<H, ActionError>> + Send;
}

/// Recovery that keeps using the handle it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReuseHandle;

impl<H: Send> RecoveryStep<H> for ReuseHandle {
    async fn recover(&self, handle: H) -> Result<H, ActionError> {
        Ok(handle)
    }
}

/// Receives every finalized result.
pub trait ResultSink<P>: Send + Sync {
    fn deliver(&self, result: &ActionResult<P>);
}

/// Forwards results over an unbounded tokio channel.
pub struct ChannelSink<P> {
    tx: mpsc::UnboundedSender<ActionResult<P>>,
}

impl<P> ChannelSink<P> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ActionResult<P>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<P: Clone + Send> ResultSink<P> for ChannelSink<P> {
    fn deliver(&self, result: &ActionResult<P>) {
        if self.tx.send(result.clone()).is_err() {
            tracing::warn!(
                execution_id = %result.report.execution_id,
                "result receiver dropped, result not delivered"
            );
        }
    }
}

/// Runs a synchronous closure on tokio's blocking pool.
///
/// The closure gets its own clones of the goal and handle. If the watchdog
/// fires first the closure keeps running to completion on its thread, but
/// nothing observes its return value.
pub struct BlockingTask<F> {
    f: Arc<F>,
}

impl<F> BlockingTask<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<G, H, P, F> TaskBody<G, H> for BlockingTask<F>
where
    G: Clone + Send + Sync + 'static,
    H: Clone + Send + Sync + 'static,
    P: Send + 'static,
    F: Fn(G, H) -> Result<P, ActionError> + Send + Sync + 'static,
{
    type Payload = P;

    async fn run(&self, goal: &G, handle: &H) -> Result<P, ActionError> {
        let f = Arc::clone(&self.f);
        let goal = goal.clone();
        let handle = handle.clone();
        tokio::task::spawn_blocking(move || (*f)(goal, handle)).await?
    }
}
