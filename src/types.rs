// src/types.rs

//! Core identifier and value types shared across the crate.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Canonical worker identifier used throughout the engine.
///
/// Workers are supplied by an external membership collaborator; the engine
/// treats the identifier as an opaque address/handle.
pub type WorkerId = String;

/// Opaque unique identifier of a task node.
///
/// Assigned by [`GraphBuilder`](crate::graph::GraphBuilder) when a deferred
/// call is wrapped, and stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }

    /// Raw numeric form, mainly for diagnostics.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A resolved value flowing between task nodes.
///
/// Values are type-erased so heterogeneous graphs can share a single value
/// store; consumers downcast back to the concrete type with [`downcast`].
pub type TaskValue = Arc<dyn Any + Send + Sync>;

/// Lift a concrete value into a [`TaskValue`].
pub fn task_value<T: Any + Send + Sync>(value: T) -> TaskValue {
    Arc::new(value)
}

/// Downcast a [`TaskValue`] back to a concrete type.
pub fn downcast<T: Any + Send + Sync>(value: &TaskValue) -> Option<&T> {
    value.downcast_ref::<T>()
}

/// Outcome of invoking a task function.
///
/// Functions report domain errors as strings; the scheduler wraps them into
/// the crate error taxonomy with the failing node attached.
pub type FuncResult = std::result::Result<TaskValue, String>;

/// Opaque callable handle wrapped into task nodes.
///
/// The label is carried for logging and diagnostics only; two funcs with the
/// same label are still distinct callables.
#[derive(Clone)]
pub struct TaskFunc {
    label: Arc<str>,
    f: Arc<dyn Fn(&[TaskValue]) -> FuncResult + Send + Sync>,
}

impl TaskFunc {
    pub fn new<F>(label: &str, f: F) -> Self
    where
        F: Fn(&[TaskValue]) -> FuncResult + Send + Sync + 'static,
    {
        Self {
            label: Arc::from(label),
            f: Arc::new(f),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Invoke the wrapped callable with already-resolved argument values.
    pub fn invoke(&self, args: &[TaskValue]) -> FuncResult {
        (self.f)(args)
    }
}

impl fmt::Debug for TaskFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFunc")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
