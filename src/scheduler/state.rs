// src/scheduler/state.rs

//! Per-run execution state for a graph.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::graph::{ExecutionGraph, Slot};
use crate::scheduler::{ExecutionFailure, FailureReason, RunOutcome};
use crate::types::{NodeId, TaskValue, WorkerId};

/// Status of a node within a run.
///
/// `Done` and `Failed` are terminal; a node is `Ready` iff all its
/// dependencies are `Done`, and `Running` on at most one worker at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Waiting on dependencies.
    Pending,
    /// All dependencies resolved; waiting for a free worker.
    Ready,
    /// Dispatched to the given worker.
    Running(WorkerId),
    /// Completed successfully; its value is (or was) in the value store.
    Done,
    /// Failed, directly or through an upstream failure.
    Failed,
}

/// Mutable state of one in-flight graph: statuses, resolved values,
/// worker assignments and dispatch attempt counts.
///
/// Owned exclusively by the [`SchedulerCore`](crate::scheduler::SchedulerCore)
/// executing the graph; nothing else mutates it. Resolved values are
/// reference-counted per dependent and dropped once every dependent has
/// completed, except the root's value which is retained for delivery.
pub struct ExecutionState {
    status: HashMap<NodeId, NodeStatus>,
    values: HashMap<NodeId, TaskValue>,
    /// Dependents (plus the client, for the root) still to consume each value.
    remaining_consumers: HashMap<NodeId, usize>,
    /// Dispatch attempts per node within this run.
    attempts: HashMap<NodeId, u32>,
    failures: HashMap<NodeId, FailureReason>,
}

impl ExecutionState {
    /// Initialise state for a validated graph: zero-dependency nodes start
    /// `Ready`, all others `Pending`.
    pub fn new(graph: &ExecutionGraph) -> Self {
        let mut status = HashMap::with_capacity(graph.len());
        let mut remaining_consumers = HashMap::with_capacity(graph.len());

        for id in graph.node_ids() {
            let initial = if graph.dependencies_of(id).is_empty() {
                NodeStatus::Ready
            } else {
                NodeStatus::Pending
            };
            status.insert(id, initial);

            let mut consumers = graph.dependents_of(id).len();
            if id == graph.root() {
                // The client consumes the root's value.
                consumers += 1;
            }
            remaining_consumers.insert(id, consumers);
        }

        Self {
            status,
            values: HashMap::new(),
            remaining_consumers,
            attempts: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn status(&self, id: NodeId) -> Option<&NodeStatus> {
        self.status.get(&id)
    }

    pub fn attempts(&self, id: NodeId) -> u32 {
        self.attempts.get(&id).copied().unwrap_or(0)
    }

    pub fn value_of(&self, id: NodeId) -> Option<&TaskValue> {
        self.values.get(&id)
    }

    pub fn failure_of(&self, id: NodeId) -> Option<&FailureReason> {
        self.failures.get(&id)
    }

    /// Nodes currently `Ready`, in id order for a stable dispatch order.
    pub fn ready_nodes(&self) -> Vec<NodeId> {
        let mut ready: Vec<NodeId> = self
            .status
            .iter()
            .filter(|(_, s)| matches!(s, NodeStatus::Ready))
            .map(|(id, _)| *id)
            .collect();
        ready.sort();
        ready
    }

    /// Nodes currently `Running`, with their workers.
    pub fn running_nodes(&self) -> Vec<(NodeId, WorkerId)> {
        self.status
            .iter()
            .filter_map(|(id, s)| match s {
                NodeStatus::Running(w) => Some((*id, w.clone())),
                _ => None,
            })
            .collect()
    }

    /// Nodes currently `Running` on the given worker.
    pub fn running_on(&self, worker: &WorkerId) -> Vec<NodeId> {
        self.status
            .iter()
            .filter_map(|(id, s)| match s {
                NodeStatus::Running(w) if w == worker => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn has_running(&self) -> bool {
        self.status
            .values()
            .any(|s| matches!(s, NodeStatus::Running(_)))
    }

    /// Substitute each of the node's slots with its resolved value.
    ///
    /// Returns `None` if a dependency value is missing, which indicates a
    /// readiness bookkeeping bug; the caller skips the dispatch.
    pub fn resolve_args(&self, graph: &ExecutionGraph, id: NodeId) -> Option<Vec<TaskValue>> {
        let node = graph.node(id)?;
        let mut args = Vec::with_capacity(node.slots.len());
        for slot in &node.slots {
            match slot {
                Slot::Literal(v) => args.push(v.clone()),
                Slot::Dep(dep) => match self.values.get(dep) {
                    Some(v) => args.push(v.clone()),
                    None => {
                        warn!(node = %id, dep = %dep, "dependency value missing at dispatch");
                        return None;
                    }
                },
            }
        }
        Some(args)
    }

    /// Record a dispatch: mark the node `Running` on `worker` and count the
    /// attempt.
    pub fn mark_running(&mut self, id: NodeId, worker: WorkerId) {
        *self.attempts.entry(id).or_insert(0) += 1;
        self.status.insert(id, NodeStatus::Running(worker));
    }

    /// Reset a `Running` node back to `Ready` for re-dispatch after its
    /// worker was lost.
    pub fn reset_for_retry(&mut self, id: NodeId) {
        if matches!(self.status.get(&id), Some(NodeStatus::Running(_))) {
            self.status.insert(id, NodeStatus::Ready);
        }
    }

    /// Record a successful completion: store the value, mark `Done`, release
    /// consumed dependency values and promote dependents whose dependencies
    /// are now all `Done`.
    ///
    /// Returns the newly `Ready` nodes.
    pub fn record_success(
        &mut self,
        graph: &ExecutionGraph,
        id: NodeId,
        value: TaskValue,
    ) -> Vec<NodeId> {
        self.status.insert(id, NodeStatus::Done);
        self.values.insert(id, value);
        self.release_consumed_deps(graph, id);

        let mut newly_ready = Vec::new();
        for dep_id in graph.dependents_of(id) {
            if matches!(self.status.get(dep_id), Some(NodeStatus::Pending))
                && self.deps_done(graph, *dep_id)
            {
                debug!(node = %dep_id, "dependencies satisfied; promoting to Ready");
                self.status.insert(*dep_id, NodeStatus::Ready);
                newly_ready.push(*dep_id);
            }
        }
        newly_ready.sort();
        newly_ready
    }

    /// Record a failure for `id` and propagate it: every node transitively
    /// depending on it is marked `Failed` without execution.
    ///
    /// Sibling subgraphs not depending on `id` are untouched. Returns the
    /// nodes newly failed by propagation (excluding `id`).
    pub fn record_failure(
        &mut self,
        graph: &ExecutionGraph,
        id: NodeId,
        reason: FailureReason,
    ) -> Vec<NodeId> {
        let origin = match reason {
            FailureReason::UpstreamFailed(origin) => origin,
            _ => id,
        };

        self.status.insert(id, NodeStatus::Failed);
        self.failures.insert(id, reason);
        self.release_consumed_deps(graph, id);

        let mut newly_failed = Vec::new();
        let mut stack: Vec<NodeId> = graph.dependents_of(id).to_vec();
        while let Some(dep_id) = stack.pop() {
            match self.status.get(&dep_id) {
                Some(NodeStatus::Pending) | Some(NodeStatus::Ready) => {
                    debug!(
                        node = %dep_id,
                        origin = %origin,
                        "marking dependent as Failed due to upstream failure"
                    );
                    self.status.insert(dep_id, NodeStatus::Failed);
                    self.failures
                        .insert(dep_id, FailureReason::UpstreamFailed(origin));
                    // A node failed by propagation will never consume its
                    // dependency values; release them too.
                    self.release_consumed_deps(graph, dep_id);
                    newly_failed.push(dep_id);
                    stack.extend(graph.dependents_of(dep_id).iter().copied());
                }
                // Terminal already, running, or not in the graph.
                _ => {}
            }
        }
        newly_failed
    }

    /// Override the root's status for cancellation. Already-terminal roots
    /// keep their outcome.
    pub fn mark_cancelled(&mut self, root: NodeId) {
        if !self.is_terminal(root) {
            self.status.insert(root, NodeStatus::Failed);
            self.failures.insert(root, FailureReason::Cancelled);
        }
    }

    pub fn is_terminal(&self, id: NodeId) -> bool {
        matches!(
            self.status.get(&id),
            Some(NodeStatus::Done) | Some(NodeStatus::Failed)
        )
    }

    /// Terminal outcome of the run, once the root is terminal.
    pub fn root_outcome(&self, graph: &ExecutionGraph) -> Option<RunOutcome> {
        let root = graph.root();
        match self.status.get(&root)? {
            NodeStatus::Done => self.values.get(&root).cloned().map(RunOutcome::Done),
            NodeStatus::Failed => {
                let reason = self
                    .failures
                    .get(&root)
                    .cloned()
                    .unwrap_or(FailureReason::NodeError("unknown failure".to_string()));
                let failure = match reason {
                    FailureReason::UpstreamFailed(origin) => ExecutionFailure {
                        node: origin,
                        reason: self
                            .failures
                            .get(&origin)
                            .cloned()
                            .unwrap_or(FailureReason::UpstreamFailed(origin)),
                    },
                    reason => ExecutionFailure { node: root, reason },
                };
                Some(RunOutcome::Failed(failure))
            }
            _ => None,
        }
    }

    fn deps_done(&self, graph: &ExecutionGraph, id: NodeId) -> bool {
        graph
            .dependencies_of(id)
            .iter()
            .all(|dep| matches!(self.status.get(dep), Some(NodeStatus::Done)))
    }

    /// Count down the consumers of each dependency value once this node is
    /// terminal; a value with no consumers left is dropped from the store.
    fn release_consumed_deps(&mut self, graph: &ExecutionGraph, id: NodeId) {
        for dep in graph.dependencies_of(id) {
            if let Some(count) = self.remaining_consumers.get_mut(dep) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    debug!(node = %dep, "all dependents finished; dropping resolved value");
                    self.values.remove(dep);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Arg, GraphBuilder};
    use crate::types::{downcast, task_value, TaskFunc};

    fn noop() -> TaskFunc {
        TaskFunc::new("noop", |_| Ok(task_value(())))
    }

    /// leaf -> mid -> root
    fn chain() -> (ExecutionGraph, NodeId, NodeId, NodeId) {
        let mut b = GraphBuilder::new();
        let leaf = b.wrap(noop(), vec![]);
        let mid = b.wrap(noop(), vec![Arg::from(&leaf)]);
        let root = b.wrap(noop(), vec![Arg::from(&mid)]);
        let graph = b.build(&root).unwrap();
        (graph, leaf.id(), mid.id(), root.id())
    }

    #[test]
    fn initial_readiness() {
        let (graph, leaf, mid, root) = chain();
        let state = ExecutionState::new(&graph);
        assert_eq!(state.status(leaf), Some(&NodeStatus::Ready));
        assert_eq!(state.status(mid), Some(&NodeStatus::Pending));
        assert_eq!(state.status(root), Some(&NodeStatus::Pending));
    }

    #[test]
    fn success_promotes_dependents() {
        let (graph, leaf, mid, _root) = chain();
        let mut state = ExecutionState::new(&graph);

        state.mark_running(leaf, "w0".to_string());
        let newly_ready = state.record_success(&graph, leaf, task_value(1i64));
        assert_eq!(newly_ready, vec![mid]);
        assert_eq!(state.status(mid), Some(&NodeStatus::Ready));
    }

    #[test]
    fn failure_cascades_to_dependents_only() {
        let mut b = GraphBuilder::new();
        let bad = b.wrap(noop(), vec![]);
        let sibling = b.wrap(noop(), vec![]);
        let dependent = b.wrap(noop(), vec![Arg::from(&bad)]);
        let root = b.wrap(noop(), vec![Arg::from(&dependent), Arg::from(&sibling)]);
        let graph = b.build(&root).unwrap();

        let mut state = ExecutionState::new(&graph);
        state.mark_running(bad.id(), "w0".to_string());
        let newly_failed = state.record_failure(
            &graph,
            bad.id(),
            FailureReason::NodeError("boom".to_string()),
        );

        assert!(newly_failed.contains(&dependent.id()));
        assert!(newly_failed.contains(&root.id()));
        assert_eq!(state.status(sibling.id()), Some(&NodeStatus::Ready));

        match state.root_outcome(&graph) {
            Some(RunOutcome::Failed(failure)) => {
                assert_eq!(failure.node, bad.id());
                assert_eq!(failure.reason, FailureReason::NodeError("boom".to_string()));
            }
            other => panic!("expected failure outcome, got {other:?}"),
        }
    }

    #[test]
    fn values_dropped_after_all_consumers_finish() {
        let (graph, leaf, mid, root) = chain();
        let mut state = ExecutionState::new(&graph);

        state.mark_running(leaf, "w0".to_string());
        state.record_success(&graph, leaf, task_value(7i64));
        assert!(state.value_of(leaf).is_some());

        state.mark_running(mid, "w0".to_string());
        state.record_success(&graph, mid, task_value(8i64));
        // `mid` was the only consumer of `leaf`.
        assert!(state.value_of(leaf).is_none());

        state.mark_running(root, "w0".to_string());
        state.record_success(&graph, root, task_value(9i64));
        // The root's value is retained for the client.
        let root_value = state.value_of(root).expect("root value retained");
        assert_eq!(downcast::<i64>(root_value), Some(&9));
    }

    #[test]
    fn upstream_failure_releases_done_values_of_failed_dependents() {
        let mut b = GraphBuilder::new();
        let done_leaf = b.wrap(noop(), vec![]);
        let bad_leaf = b.wrap(noop(), vec![]);
        let join = b.wrap(noop(), vec![Arg::from(&done_leaf), Arg::from(&bad_leaf)]);
        let root = b.wrap(noop(), vec![Arg::from(&join)]);
        let graph = b.build(&root).unwrap();

        let mut state = ExecutionState::new(&graph);
        state.mark_running(done_leaf.id(), "w0".to_string());
        state.record_success(&graph, done_leaf.id(), task_value(1i64));
        assert!(state.value_of(done_leaf.id()).is_some());

        state.mark_running(bad_leaf.id(), "w1".to_string());
        state.record_failure(
            &graph,
            bad_leaf.id(),
            FailureReason::NodeError("boom".to_string()),
        );

        // `join` was the done leaf's only consumer and will never run, so
        // the stored value must not outlive the failure cascade.
        assert!(state.value_of(done_leaf.id()).is_none());
        assert_eq!(state.status(join.id()), Some(&NodeStatus::Failed));
    }

    #[test]
    fn retry_resets_running_to_ready() {
        let (graph, leaf, _mid, _root) = chain();
        let mut state = ExecutionState::new(&graph);

        state.mark_running(leaf, "w0".to_string());
        assert_eq!(state.attempts(leaf), 1);
        state.reset_for_retry(leaf);
        assert_eq!(state.status(leaf), Some(&NodeStatus::Ready));

        state.mark_running(leaf, "w1".to_string());
        assert_eq!(state.attempts(leaf), 2);
    }
}
