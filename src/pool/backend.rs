// src/pool/backend.rs

//! Pluggable worker pool abstraction.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::scheduler::{SchedulerEvent, TaskCall};
use crate::types::{NodeId, WorkerId};

/// Snapshot of a single remote execution endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub id: WorkerId,
    /// Number of calls currently assigned to this worker.
    pub load: usize,
    pub alive: bool,
}

impl Worker {
    /// A live worker with nothing assigned.
    pub fn idle(id: WorkerId) -> Self {
        Self {
            id,
            load: 0,
            alive: true,
        }
    }
}

/// Boxed future returned by pool operations.
pub type PoolFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting remote execution capability.
///
/// `dispatch` is non-blocking from the scheduler's perspective: it only hands
/// the call over; completion is signalled back as a
/// [`SchedulerEvent::NodeFinished`] on the run's event channel, never by the
/// caller polling. The scheduler guarantees `call.args` contains no
/// unresolved node references.
///
/// Implementations deliver at most one completion per dispatch; the
/// scheduler additionally tolerates duplicates that can arise under retry.
pub trait WorkerPool: Send {
    /// Hand a resolved call to the given worker.
    ///
    /// Returns `WorkerUnavailable` if the worker is unknown or dead; the
    /// scheduler treats that like any other worker loss.
    fn dispatch(
        &mut self,
        worker: &WorkerId,
        call: TaskCall,
        events: &mpsc::Sender<SchedulerEvent>,
    ) -> PoolFuture<'_>;

    /// Best-effort abandonment of outstanding dispatches for these nodes.
    ///
    /// Used on cancellation. An abandoned call must not report completion.
    fn abandon(&mut self, nodes: &[NodeId]) -> PoolFuture<'_>;

    /// Current cluster membership snapshot.
    fn membership(&self) -> Vec<Worker>;

    /// Register a channel on which join/leave notifications are delivered
    /// for the lifetime of a run.
    fn watch_membership(&mut self, events: mpsc::Sender<SchedulerEvent>);
}
