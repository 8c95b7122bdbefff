//! A scripted worker pool that never runs real workers.
//!
//! Tests script what happens when a node is dispatched, keyed by the
//! function label: invoke the function inline, report a failure, or
//! simulate losing the assigned worker (with a replacement joining so the
//! scheduler can retry). Every dispatch is recorded for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use taskmesh::errors::{Result, TaskmeshError};
use taskmesh::pool::{PoolFuture, Worker, WorkerPool};
use taskmesh::scheduler::{CompletionOutcome, SchedulerEvent, TaskCall};
use taskmesh::types::{NodeId, WorkerId};

/// What the pool does when a call with a matching label is dispatched.
#[derive(Debug, Clone)]
pub enum ScriptAction {
    /// Run the function inline and report its outcome.
    Invoke,
    /// Report a failure without running the function.
    Fail(String),
    /// Do not report completion; instead the assigned worker leaves and a
    /// fresh replacement joins, so the scheduler retries elsewhere.
    LoseWorker,
}

/// One recorded dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub node: NodeId,
    pub worker: WorkerId,
    pub label: String,
    pub attempt: u32,
}

struct Inner {
    workers: HashMap<WorkerId, bool>,
    script: HashMap<String, VecDeque<ScriptAction>>,
    dispatches: Vec<DispatchRecord>,
    abandoned: Vec<NodeId>,
    spares: usize,
}

/// Scripted [`WorkerPool`] for tests. Cloning shares all state.
#[derive(Clone)]
pub struct FakeWorkerPool {
    inner: Arc<Mutex<Inner>>,
}

impl FakeWorkerPool {
    /// Pool with `n` live workers named `w0` .. `w{n-1}`; every dispatch
    /// defaults to [`ScriptAction::Invoke`].
    pub fn new(n: usize) -> Self {
        let workers = (0..n).map(|i| (format!("w{i}"), true)).collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                workers,
                script: HashMap::new(),
                dispatches: Vec::new(),
                abandoned: Vec::new(),
                spares: 0,
            })),
        }
    }

    /// Queue an action for the next dispatch of a call with this label.
    /// Actions are consumed in order; once exhausted, dispatches fall back
    /// to `Invoke`.
    pub fn script(self, label: &str, action: ScriptAction) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .script
                .entry(label.to_string())
                .or_default()
                .push_back(action);
        }
        self
    }

    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.inner.lock().unwrap().dispatches.clone()
    }

    /// Dispatches of calls with the given label.
    pub fn dispatches_of(&self, label: &str) -> Vec<DispatchRecord> {
        self.dispatches()
            .into_iter()
            .filter(|d| d.label == label)
            .collect()
    }

    pub fn abandoned(&self) -> Vec<NodeId> {
        self.inner.lock().unwrap().abandoned.clone()
    }
}

impl WorkerPool for FakeWorkerPool {
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
            let action = {
                let mut guard = inner.lock().unwrap();
                match guard.workers.get(&worker) {
                    Some(true) => {}
                    _ => return Err(TaskmeshError::WorkerUnavailable(worker)),
                }
                guard.dispatches.push(DispatchRecord {
                    node: call.node,
                    worker: worker.clone(),
                    label: call.func.label().to_string(),
                    attempt: call.attempt,
                });
                guard
                    .script
                    .get_mut(call.func.label())
                    .and_then(|queue| queue.pop_front())
                    .unwrap_or(ScriptAction::Invoke)
            };

            match action {
                ScriptAction::Invoke => {
                    let outcome = match call.func.invoke(&call.args) {
                        Ok(value) => CompletionOutcome::Success(value),
                        Err(reason) => CompletionOutcome::Failed(reason),
                    };
                    let _ = events
                        .send(SchedulerEvent::NodeFinished {
                            node: call.node,
                            worker,
                            outcome,
                        })
                        .await;
                }
                ScriptAction::Fail(reason) => {
                    let _ = events
                        .send(SchedulerEvent::NodeFinished {
                            node: call.node,
                            worker,
                            outcome: CompletionOutcome::Failed(reason),
                        })
                        .await;
                }
                ScriptAction::LoseWorker => {
                    let replacement = {
                        let mut guard = inner.lock().unwrap();
                        guard.workers.insert(worker.clone(), false);
                        guard.spares += 1;
                        let id = format!("spare{}", guard.spares);
                        guard.workers.insert(id.clone(), true);
                        id
                    };
                    let _ = events
                        .send(SchedulerEvent::WorkerLeft {
                            worker: worker.clone(),
                        })
                        .await;
                    let _ = events
                        .send(SchedulerEvent::WorkerJoined {
                            worker: replacement,
                        })
                        .await;
                }
            }

            Ok(())
        })
    }

    fn abandon(&mut self, nodes: &[NodeId]) -> PoolFuture<'_> {
        let inner = Arc::clone(&self.inner);
        let nodes = nodes.to_vec();
        Box::pin(async move {
            inner.lock().unwrap().abandoned.extend(nodes);
            Ok(())
        })
    }

    fn membership(&self) -> Vec<Worker> {
        let inner = self.inner.lock().unwrap();
        let mut members: Vec<Worker> = inner
            .workers
            .iter()
            .map(|(id, alive)| Worker {
                id: id.clone(),
                load: 0,
                alive: *alive,
            })
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    fn watch_membership(&mut self, _events: mpsc::Sender<SchedulerEvent>) {
        // Membership changes are delivered inline from `dispatch`, on the
        // run's own channel.
    }
}
