// src/scheduler/core.rs

//! Pure scheduler core state machine.
//!
//! The core consumes [`SchedulerEvent`]s and produces commands describing
//! what the IO shell should do next (dispatch calls, abandon in-flight work,
//! finish with an outcome). It owns the [`ExecutionState`] exclusively, so
//! every status transition is serialized through one place, and it is
//! extensively unit tested without any Tokio, channels or workers.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::graph::ExecutionGraph;
use crate::pool::Worker;
use crate::scheduler::state::{ExecutionState, NodeStatus};
use crate::scheduler::{
    Assignment, CompletionOutcome, FailureReason, RunOutcome, SchedulerEvent, SchedulerOptions,
    TaskCall,
};
use crate::types::{NodeId, WorkerId};

/// Command produced by the core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    /// Dispatch these calls to their assigned workers.
    Dispatch(Vec<Assignment>),
    /// Best-effort abandon of outstanding dispatches for these nodes.
    Abandon(Vec<NodeId>),
    /// The run reached a terminal state.
    Finish(RunOutcome),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct SchedulerStep {
    pub commands: Vec<SchedulerCommand>,
    /// Whether the outer event loop should keep running.
    pub keep_running: bool,
}

#[derive(Debug, Clone)]
struct WorkerSlot {
    load: usize,
    alive: bool,
}

/// Single-run scheduler: topologically correct, maximally parallel execution
/// of one [`ExecutionGraph`] against a set of workers.
///
/// Dispatch policy: every currently-`Ready` node is assigned to an idle live
/// worker, in node-id order, one outstanding call per worker. `Ready` nodes
/// beyond worker capacity simply wait in the ready set until a worker frees;
/// that is the backpressure mechanism.
///
/// Load is tracked per run: only this run's own dispatches count against a
/// worker, so runs sharing a pool never wait on each other's calls. The pool
/// decides how concurrent calls from separate runs are executed.
pub struct SchedulerCore {
    graph: ExecutionGraph,
    state: ExecutionState,
    workers: HashMap<WorkerId, WorkerSlot>,
    options: SchedulerOptions,
    finished: bool,
}

impl SchedulerCore {
    pub fn new(graph: ExecutionGraph, workers: Vec<Worker>, options: SchedulerOptions) -> Self {
        let state = ExecutionState::new(&graph);
        // Another run's in-flight calls would never produce events on this
        // run's channel, so a load carried over from the membership snapshot
        // could never be decremented here. Every worker starts idle from this
        // run's point of view.
        let workers = workers
            .into_iter()
            .map(|w| {
                (
                    w.id,
                    WorkerSlot {
                        load: 0,
                        alive: w.alive,
                    },
                )
            })
            .collect();

        Self {
            graph,
            state,
            workers,
            options,
            finished: false,
        }
    }

    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Kick off the run by dispatching the initial ready set.
    pub fn start(&mut self) -> SchedulerStep {
        info!(
            nodes = self.graph.len(),
            root = %self.graph.root(),
            workers = self.workers.len(),
            "starting scheduler run"
        );

        let mut commands = Vec::new();
        let assignments = self.dispatch_ready();
        if !assignments.is_empty() {
            commands.push(SchedulerCommand::Dispatch(assignments));
        }
        let keep_running = self.maybe_finish(&mut commands);
        SchedulerStep {
            commands,
            keep_running,
        }
    }

    /// Handle a single event, updating state and returning the resulting
    /// commands.
    pub fn step(&mut self, event: SchedulerEvent) -> SchedulerStep {
        if self.finished {
            return SchedulerStep {
                commands: Vec::new(),
                keep_running: false,
            };
        }

        match event {
            SchedulerEvent::NodeFinished {
                node,
                worker,
                outcome,
            } => self.handle_node_finished(node, worker, outcome),
            SchedulerEvent::WorkerJoined { worker } => self.handle_worker_joined(worker),
            SchedulerEvent::WorkerLeft { worker } => self.handle_worker_left(worker),
            SchedulerEvent::CancelRequested => self.handle_cancel(),
        }
    }

    fn handle_node_finished(
        &mut self,
        node: NodeId,
        worker: WorkerId,
        outcome: CompletionOutcome,
    ) -> SchedulerStep {
        // Idempotence under retry: only a report matching the recorded
        // assignment is accepted; duplicates and reports from superseded
        // workers are ignored.
        match self.state.status(node) {
            Some(NodeStatus::Running(assigned)) if *assigned == worker => {}
            other => {
                debug!(
                    node = %node,
                    worker = %worker,
                    status = ?other,
                    "ignoring completion report that does not match the recorded assignment"
                );
                return self.after_event();
            }
        }

        if let Some(slot) = self.workers.get_mut(&worker) {
            slot.load = slot.load.saturating_sub(1);
        }

        match outcome {
            CompletionOutcome::Success(value) => {
                debug!(node = %node, worker = %worker, "node completed successfully");
                self.state.record_success(&self.graph, node, value);
            }
            CompletionOutcome::Failed(reason) => {
                warn!(node = %node, worker = %worker, reason = %reason, "node failed; failing dependents");
                self.state
                    .record_failure(&self.graph, node, FailureReason::NodeError(reason));
            }
        }

        self.after_event()
    }

    fn handle_worker_joined(&mut self, worker: WorkerId) -> SchedulerStep {
        info!(worker = %worker, "worker joined");
        let slot = self.workers.entry(worker).or_insert(WorkerSlot {
            load: 0,
            alive: true,
        });
        slot.alive = true;
        self.after_event()
    }

    /// Worker loss is a retryable failure for its running nodes: each is
    /// reset to `Ready` for re-dispatch to a different worker, up to the
    /// per-node retry bound; past the bound the node is failed.
    fn handle_worker_left(&mut self, worker: WorkerId) -> SchedulerStep {
        let Some(slot) = self.workers.get_mut(&worker) else {
            debug!(worker = %worker, "departure of unknown worker; ignoring");
            return self.after_event();
        };
        slot.alive = false;
        slot.load = 0;

        for node in self.state.running_on(&worker) {
            let attempts = self.state.attempts(node);
            if attempts > self.options.max_retries {
                warn!(
                    node = %node,
                    worker = %worker,
                    attempts,
                    "worker lost and retry budget exhausted; failing node"
                );
                self.state.record_failure(
                    &self.graph,
                    node,
                    FailureReason::WorkerLost(worker.clone()),
                );
            } else {
                warn!(
                    node = %node,
                    worker = %worker,
                    attempts,
                    max_retries = self.options.max_retries,
                    "worker lost; node reset for retry"
                );
                self.state.reset_for_retry(node);
            }
        }

        self.after_event()
    }

    fn handle_cancel(&mut self) -> SchedulerStep {
        info!(root = %self.graph.root(), "cancellation requested");
        self.state.mark_cancelled(self.graph.root());

        let mut commands = Vec::new();
        let in_flight: Vec<NodeId> = self
            .state
            .running_nodes()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        if !in_flight.is_empty() {
            commands.push(SchedulerCommand::Abandon(in_flight));
        }

        if let Some(outcome) = self.state.root_outcome(&self.graph) {
            self.finished = true;
            commands.push(SchedulerCommand::Finish(outcome));
        }

        SchedulerStep {
            commands,
            keep_running: false,
        }
    }

    /// Common tail for every event: dispatch newly ready work while the root
    /// is still undecided, then finish if the run is complete.
    fn after_event(&mut self) -> SchedulerStep {
        let mut commands = Vec::new();

        if !self.state.is_terminal(self.graph.root()) {
            let assignments = self.dispatch_ready();
            if !assignments.is_empty() {
                commands.push(SchedulerCommand::Dispatch(assignments));
            }
        }

        let keep_running = self.maybe_finish(&mut commands);
        SchedulerStep {
            commands,
            keep_running,
        }
    }

    /// Pair ready nodes with idle live workers, in node-id and worker-id
    /// order. One outstanding call per worker.
    fn dispatch_ready(&mut self) -> Vec<Assignment> {
        let ready = self.state.ready_nodes();
        if ready.is_empty() {
            return Vec::new();
        }

        let mut idle: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, slot)| slot.alive && slot.load == 0)
            .map(|(id, _)| id.clone())
            .collect();
        idle.sort();
        idle.reverse(); // pop() takes the smallest id first

        let mut assignments = Vec::new();
        for node in ready {
            let Some(worker) = idle.pop() else {
                // All workers busy; remaining ready nodes wait.
                break;
            };

            let Some(args) = self.state.resolve_args(&self.graph, node) else {
                idle.push(worker);
                continue;
            };
            // Graph validation guarantees the node exists.
            let Some(graph_node) = self.graph.node(node) else {
                idle.push(worker);
                continue;
            };

            self.state.mark_running(node, worker.clone());
            if let Some(slot) = self.workers.get_mut(&worker) {
                slot.load += 1;
            }

            let call = TaskCall {
                node,
                func: graph_node.func.clone(),
                args,
                attempt: self.state.attempts(node),
            };
            debug!(node = %node, worker = %worker, attempt = call.attempt, "dispatching node");
            assignments.push(Assignment { worker, call });
        }

        assignments
    }

    /// The run is finished once the root is terminal and no work is still
    /// in flight; in-flight sibling work is allowed to complete first.
    fn maybe_finish(&mut self, commands: &mut Vec<SchedulerCommand>) -> bool {
        if self.finished {
            return false;
        }
        if !self.state.is_terminal(self.graph.root()) || self.state.has_running() {
            return true;
        }

        if let Some(outcome) = self.state.root_outcome(&self.graph) {
            info!(?outcome, root = %self.graph.root(), "run reached terminal state");
            self.finished = true;
            commands.push(SchedulerCommand::Finish(outcome));
            return false;
        }
        true
    }
}
