// src/pool/local.rs

//! In-process worker pool backed by the Tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskmeshError};
use crate::pool::backend::{PoolFuture, Worker, WorkerPool};
use crate::scheduler::{CompletionOutcome, SchedulerEvent, TaskCall};
use crate::types::{NodeId, WorkerId};

struct WorkerState {
    load: usize,
    alive: bool,
}

struct RunningCall {
    worker: WorkerId,
    abort: AbortHandle,
}

struct Inner {
    workers: Mutex<HashMap<WorkerId, WorkerState>>,
    running: Mutex<HashMap<NodeId, RunningCall>>,
    watchers: Mutex<Vec<mpsc::Sender<SchedulerEvent>>>,
}

/// Worker pool that executes calls as local Tokio tasks, one logical worker
/// per slot.
///
/// Each dispatch runs the function on the blocking thread pool and reports a
/// `NodeFinished` event back on the run's channel. Membership is mutable at
/// runtime: [`add_worker`](LocalWorkerPool::add_worker) and
/// [`kill_worker`](LocalWorkerPool::kill_worker) broadcast join/leave
/// notifications to every watching run, which also makes this pool useful
/// for exercising worker-loss handling.
///
/// Cloning shares the underlying pool, so several concurrent runs can
/// execute against the same workers.
#[derive(Clone)]
pub struct LocalWorkerPool {
    inner: Arc<Inner>,
}

impl LocalWorkerPool {
    pub fn new(ids: Vec<WorkerId>) -> Self {
        let workers = ids
            .into_iter()
            .map(|id| {
                (
                    id,
                    WorkerState {
                        load: 0,
                        alive: true,
                    },
                )
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                workers: Mutex::new(workers),
                running: Mutex::new(HashMap::new()),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Pool with `n` workers named `local-0` .. `local-{n-1}`.
    pub fn with_workers(n: usize) -> Self {
        Self::new((0..n).map(|i| format!("local-{i}")).collect())
    }

    /// Add (or revive) a worker and notify watching runs.
    pub async fn add_worker(&self, id: WorkerId) {
        {
            let mut workers = self.inner.workers.lock().expect("pool lock poisoned");
            let state = workers.entry(id.clone()).or_insert(WorkerState {
                load: 0,
                alive: true,
            });
            state.alive = true;
        }
        info!(worker = %id, "worker added to local pool");
        self.broadcast(SchedulerEvent::WorkerJoined { worker: id }).await;
    }

    /// Declare a worker dead: its in-flight calls are aborted without
    /// reporting completion, and watching runs are notified of the loss.
    pub async fn kill_worker(&self, id: &WorkerId) {
        {
            let mut workers = self.inner.workers.lock().expect("pool lock poisoned");
            if let Some(state) = workers.get_mut(id) {
                state.alive = false;
                state.load = 0;
            }
        }
        {
            let mut running = self.inner.running.lock().expect("pool lock poisoned");
            running.retain(|node, call| {
                if &call.worker == id {
                    debug!(node = %node, worker = %id, "aborting call on dead worker");
                    call.abort.abort();
                    false
                } else {
                    true
                }
            });
        }
        warn!(worker = %id, "worker declared dead");
        self.broadcast(SchedulerEvent::WorkerLeft { worker: id.clone() })
            .await;
    }

    async fn broadcast(&self, event: SchedulerEvent) {
        let watchers: Vec<mpsc::Sender<SchedulerEvent>> = {
            let guard = self.inner.watchers.lock().expect("pool lock poisoned");
            guard.clone()
        };
        for tx in watchers {
            // A closed receiver just means that run already finished.
            let _ = tx.send(event.clone()).await;
        }
    }

    fn finish_call(inner: &Inner, node: NodeId, worker: &WorkerId) {
        {
            let mut running = inner.running.lock().expect("pool lock poisoned");
            running.remove(&node);
        }
        let mut workers = inner.workers.lock().expect("pool lock poisoned");
        if let Some(state) = workers.get_mut(worker) {
            state.load = state.load.saturating_sub(1);
        }
    }
}

impl WorkerPool for LocalWorkerPool {
    fn dispatch(
        &mut self,
        worker: &WorkerId,
        call: TaskCall,
        events: &mpsc::Sender<SchedulerEvent>,
    ) -> PoolFuture<'_> {
        let inner = Arc::clone(&self.inner);
        let worker = worker.clone();
        let events = events.clone();

        Box::pin(async move {
            {
                let mut workers = inner.workers.lock().expect("pool lock poisoned");
                match workers.get_mut(&worker) {
                    Some(state) if state.alive => state.load += 1,
                    _ => return Err(TaskmeshError::WorkerUnavailable(worker)),
                }
            }

            let node = call.node;
            let func = call.func;
            let args = call.args;
            debug!(node = %node, worker = %worker, func = func.label(), "local pool executing call");

            let task_inner = Arc::clone(&inner);
            let task_worker = worker.clone();
            // Hold the running map while spawning so finish_call cannot race
            // ahead of the insert below.
            let mut running = inner.running.lock().expect("pool lock poisoned");
            let handle = tokio::spawn(async move {
                let joined = tokio::task::spawn_blocking(move || func.invoke(&args)).await;
                let outcome = match joined {
                    Ok(Ok(value)) => CompletionOutcome::Success(value),
                    Ok(Err(reason)) => CompletionOutcome::Failed(reason),
                    Err(err) => CompletionOutcome::Failed(format!("call panicked: {err}")),
                };

                LocalWorkerPool::finish_call(&task_inner, node, &task_worker);

                if events
                    .send(SchedulerEvent::NodeFinished {
                        node,
                        worker: task_worker,
                        outcome,
                    })
                    .await
                    .is_err()
                {
                    debug!(node = %node, "run finished before completion could be delivered");
                }
            });

            running.insert(
                node,
                RunningCall {
                    worker,
                    abort: handle.abort_handle(),
                },
            );
            Ok(())
        })
    }

    fn abandon(&mut self, nodes: &[NodeId]) -> PoolFuture<'_> {
        let inner = Arc::clone(&self.inner);
        let nodes = nodes.to_vec();

        Box::pin(async move {
            let calls: Vec<(NodeId, RunningCall)> = {
                let mut running = inner.running.lock().expect("pool lock poisoned");
                nodes
                    .iter()
                    .filter_map(|node| running.remove(node).map(|call| (*node, call)))
                    .collect()
            };

            for (node, call) in calls {
                debug!(node = %node, worker = %call.worker, "abandoning in-flight call");
                call.abort.abort();
                let mut workers = inner.workers.lock().expect("pool lock poisoned");
                if let Some(state) = workers.get_mut(&call.worker) {
                    state.load = state.load.saturating_sub(1);
                }
            }
            Ok(())
        })
    }

    fn membership(&self) -> Vec<Worker> {
        let workers = self.inner.workers.lock().expect("pool lock poisoned");
        let mut members: Vec<Worker> = workers
            .iter()
            .map(|(id, state)| Worker {
                id: id.clone(),
                load: state.load,
                alive: state.alive,
            })
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    fn watch_membership(&mut self, events: mpsc::Sender<SchedulerEvent>) {
        let mut watchers = self.inner.watchers.lock().expect("pool lock poisoned");
        watchers.push(events);
    }
}
