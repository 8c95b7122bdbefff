// src/graph/builder.rs

use std::collections::HashSet;

use tracing::debug;

use crate::errors::Result;
use crate::graph::graph::ExecutionGraph;
use crate::graph::node::{Arg, GraphNode, Slot, TaskNode};
use crate::types::{NodeId, TaskFunc};

/// Wraps function calls into deferred [`TaskNode`]s and flattens a root node
/// into an [`ExecutionGraph`].
///
/// Wrapping is pure: no execution happens until the graph is submitted to a
/// scheduler run. Conditional construction needs no graph support; decide
/// which call to wrap with ordinary control flow on already-known values, and
/// only the chosen branch becomes a node.
///
/// Node ids are unique per builder; nodes combined into one graph must come
/// from the same builder instance.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    next_id: u64,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Wrap a call into a deferred node.
    ///
    /// Arguments that are themselves nodes become dependencies; plain values
    /// are stored directly in the slot.
    pub fn wrap(&mut self, func: TaskFunc, args: Vec<Arg>) -> TaskNode {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;

        debug!(node = %id, func = func.label(), args = args.len(), "wrapped deferred call");
        TaskNode::new(id, func, args)
    }

    /// Flatten the transitive closure of `root` into an immutable
    /// [`ExecutionGraph`].
    ///
    /// Collects every reachable node depth-first, then validates the closure
    /// property and acyclicity in [`ExecutionGraph::from_parts`].
    pub fn build(&self, root: &TaskNode) -> Result<ExecutionGraph> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut flattened: Vec<GraphNode> = Vec::new();
        let mut stack: Vec<TaskNode> = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }

            let mut slots = Vec::with_capacity(node.args().len());
            for arg in node.args() {
                match arg {
                    Arg::Value(v) => slots.push(Slot::Literal(v.clone())),
                    Arg::Node(dep) => {
                        slots.push(Slot::Dep(dep.id()));
                        stack.push(dep.clone());
                    }
                }
            }

            flattened.push(GraphNode {
                id: node.id(),
                func: node.func().clone(),
                slots,
            });
        }

        ExecutionGraph::from_parts(flattened, root.id())
    }
}
