// src/client.rs

//! User-facing entry point for submitting graphs to a worker pool.
//!
//! A [`Client`] wraps a pool and spawns one [`SchedulerRun`] per submitted
//! graph. Runs are independent: each gets its own event channel and
//! execution state, and concurrent runs share only the pool's workers.

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::Result;
use crate::graph::ExecutionGraph;
use crate::pool::{Worker, WorkerPool};
use crate::scheduler::{RunOutcome, SchedulerEvent, SchedulerOptions, SchedulerRun};
use crate::types::{downcast, TaskValue};

/// Snapshot of the pool's worker membership.
#[derive(Debug, Clone)]
pub struct ClusterStatus {
    pub total_workers: usize,
    pub live_workers: usize,
    pub workers: Vec<Worker>,
}

/// Handle to a submitted run.
///
/// The run executes on the client's Tokio runtime whether or not the handle
/// is awaited; the handle is how the caller collects the outcome or cancels.
pub struct RunHandle {
    join: JoinHandle<Result<RunOutcome>>,
    cancel_tx: mpsc::Sender<SchedulerEvent>,
}

impl RunHandle {
    /// Wait for the run and return its terminal outcome, successful or not.
    pub async fn outcome(self) -> Result<RunOutcome> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => Err(anyhow!("scheduler run task failed: {err}").into()),
        }
    }

    /// Wait for the run and return the root value, converting a failed run
    /// into an error naming the originating node.
    pub async fn result(self) -> Result<TaskValue> {
        match self.outcome().await? {
            RunOutcome::Done(value) => Ok(value),
            RunOutcome::Failed(failure) => Err(failure.into_error()),
        }
    }

    /// Like [`result`](RunHandle::result), downcasting the root value to a
    /// concrete type.
    pub async fn result_as<T: Clone + Send + Sync + 'static>(self) -> Result<T> {
        let value = self.result().await?;
        match downcast::<T>(&value) {
            Some(v) => Ok(v.clone()),
            None => Err(anyhow!(
                "root value has a different type than requested ({})",
                std::any::type_name::<T>()
            )
            .into()),
        }
    }

    /// Request cancellation of the run. Best effort: a run that already
    /// finished ignores this.
    pub async fn cancel(&self) {
        debug!("requesting run cancellation");
        let _ = self.cancel_tx.send(SchedulerEvent::CancelRequested).await;
    }
}

/// Client over a worker pool.
///
/// The pool is cloned per submission so that concurrent runs share the same
/// workers; [`LocalWorkerPool`](crate::pool::LocalWorkerPool) clones share
/// the underlying pool, and a distributed pool implementation should do the
/// same.
pub struct Client<P> {
    pool: P,
    options: SchedulerOptions,
}

impl<P> Client<P>
where
    P: WorkerPool + Clone + Send + 'static,
{
    pub fn new(pool: P, options: SchedulerOptions) -> Self {
        Self { pool, options }
    }

    pub fn with_defaults(pool: P) -> Self {
        Self::new(pool, SchedulerOptions::default())
    }

    /// Submit a graph for execution, returning immediately with a handle.
    pub fn submit(&self, graph: ExecutionGraph) -> RunHandle {
        info!(nodes = graph.len(), root = %graph.root(), "submitting graph");

        let run = SchedulerRun::new(graph, self.pool.clone(), self.options);
        let cancel_tx = run.events_sender();
        let join = tokio::spawn(run.run());

        RunHandle { join, cancel_tx }
    }

    /// Current worker membership as seen by the pool.
    pub fn status(&self) -> ClusterStatus {
        let workers = self.pool.membership();
        let live_workers = workers.iter().filter(|w| w.alive).count();
        ClusterStatus {
            total_workers: workers.len(),
            live_workers,
            workers,
        }
    }
}
