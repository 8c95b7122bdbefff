// src/graph/node.rs

//! Deferred-call data model.

use std::fmt;
use std::sync::Arc;

use crate::types::{NodeId, TaskFunc, TaskValue};

/// Argument to a deferred call as seen by the caller: either a plain value or
/// a previously wrapped node whose result feeds this call.
#[derive(Clone)]
pub enum Arg {
    Value(TaskValue),
    Node(TaskNode),
}

impl Arg {
    /// Convenience for lifting a concrete value into an argument.
    pub fn value<T: std::any::Any + Send + Sync>(v: T) -> Self {
        Arg::Value(crate::types::task_value(v))
    }
}

impl From<TaskNode> for Arg {
    fn from(node: TaskNode) -> Self {
        Arg::Node(node)
    }
}

impl From<&TaskNode> for Arg {
    fn from(node: &TaskNode) -> Self {
        Arg::Node(node.clone())
    }
}

struct NodeInner {
    id: NodeId,
    func: TaskFunc,
    args: Vec<Arg>,
}

/// The unit of deferred computation: a function reference, its arguments and
/// a unique identity.
///
/// Nodes are immutable after creation and cheap to clone; cloning shares the
/// underlying call. Argument slots that are themselves nodes keep the whole
/// upstream graph alive until it is flattened by
/// [`GraphBuilder::build`](crate::graph::GraphBuilder::build).
#[derive(Clone)]
pub struct TaskNode {
    inner: Arc<NodeInner>,
}

impl TaskNode {
    pub(crate) fn new(id: NodeId, func: TaskFunc, args: Vec<Arg>) -> Self {
        Self {
            inner: Arc::new(NodeInner { id, func, args }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn func(&self) -> &TaskFunc {
        &self.inner.func
    }

    pub fn args(&self) -> &[Arg] {
        &self.inner.args
    }

    /// Ids of the argument slots that reference other nodes, deduplicated,
    /// in slot order.
    pub fn dependency_ids(&self) -> Vec<NodeId> {
        let mut seen = std::collections::HashSet::new();
        let mut deps = Vec::new();
        for arg in &self.inner.args {
            if let Arg::Node(node) = arg {
                if seen.insert(node.id()) {
                    deps.push(node.id());
                }
            }
        }
        deps
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.inner.id)
            .field("func", &self.inner.func.label())
            .field("args", &self.inner.args.len())
            .finish()
    }
}

/// Flattened argument slot inside an [`ExecutionGraph`](crate::graph::ExecutionGraph):
/// node references are stored by id.
#[derive(Clone)]
pub enum Slot {
    Literal(TaskValue),
    Dep(NodeId),
}

// Manual Debug since `TaskValue` is type-erased.
impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Literal(_) => write!(f, "Literal(..)"),
            Slot::Dep(id) => write!(f, "Dep({id})"),
        }
    }
}

/// A task node in its flattened, per-graph form.
#[derive(Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub func: TaskFunc,
    pub slots: Vec<Slot>,
}

impl GraphNode {
    /// Ids this node depends on, deduplicated, in slot order.
    pub fn dependency_ids(&self) -> Vec<NodeId> {
        let mut seen = std::collections::HashSet::new();
        let mut deps = Vec::new();
        for slot in &self.slots {
            if let Slot::Dep(id) = slot {
                if seen.insert(*id) {
                    deps.push(*id);
                }
            }
        }
        deps
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("func", &self.func.label())
            .field("slots", &self.slots)
            .finish()
    }
}
