// src/scheduler/mod.rs

//! Distributed execution of an [`ExecutionGraph`](crate::graph::ExecutionGraph).
//!
//! This module ties together:
//! - per-run execution state ([`state`])
//! - the pure core state machine that reacts to completion, worker
//!   membership and cancellation events ([`core`])
//! - the async shell that drives the core against a
//!   [`WorkerPool`](crate::pool::WorkerPool) ([`runtime`])
//!
//! All status transitions are serialized through the core; the shell only
//! moves events and dispatches across the channel boundary.

use std::fmt;

use crate::errors::TaskmeshError;
use crate::types::{NodeId, TaskFunc, TaskValue, WorkerId};

pub mod core;
pub mod runtime;
pub mod state;

pub use core::{SchedulerCommand, SchedulerCore, SchedulerStep};
pub use runtime::SchedulerRun;
pub use state::{ExecutionState, NodeStatus};

/// Options that influence how a scheduler run behaves.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// How many times a node is re-dispatched after losing its worker before
    /// the node is failed. The total dispatch budget is `1 + max_retries`.
    pub max_retries: u32,
    /// Capacity of the run's event channel.
    pub event_capacity: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            event_capacity: 64,
        }
    }
}

/// Result of executing a single node, as reported by a worker.
#[derive(Clone)]
pub enum CompletionOutcome {
    Success(TaskValue),
    Failed(String),
}

impl fmt::Debug for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionOutcome::Success(_) => write!(f, "Success(..)"),
            CompletionOutcome::Failed(reason) => write!(f, "Failed({reason:?})"),
        }
    }
}

/// Events flowing into a scheduler run from the worker pool, the membership
/// collaborator and the client.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A worker finished executing a node, successfully or not.
    NodeFinished {
        node: NodeId,
        worker: WorkerId,
        outcome: CompletionOutcome,
    },
    /// A worker joined the cluster.
    WorkerJoined { worker: WorkerId },
    /// A worker left the cluster or was declared dead.
    WorkerLeft { worker: WorkerId },
    /// The client requested cancellation of this run.
    CancelRequested,
}

/// A fully resolved call the scheduler wants a worker to execute now.
///
/// `args` contains no unresolved node references; each dependency slot has
/// been substituted with its stored value.
#[derive(Clone)]
pub struct TaskCall {
    pub node: NodeId,
    pub func: TaskFunc,
    pub args: Vec<TaskValue>,
    /// 1-based dispatch attempt for this node within the run.
    pub attempt: u32,
}

impl fmt::Debug for TaskCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCall")
            .field("node", &self.node)
            .field("func", &self.func.label())
            .field("args", &self.args.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// A call paired with the worker chosen to execute it.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub worker: WorkerId,
    pub call: TaskCall,
}

/// Why a node (and hence possibly the run) failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The node's function returned an error.
    NodeError(String),
    /// An upstream dependency failed; the id is the originating node.
    UpstreamFailed(NodeId),
    /// The node's worker was lost and the retry budget is exhausted.
    WorkerLost(WorkerId),
    /// The run was cancelled by the client.
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NodeError(msg) => write!(f, "{msg}"),
            FailureReason::UpstreamFailed(id) => write!(f, "upstream node {id} failed"),
            FailureReason::WorkerLost(w) => {
                write!(f, "worker {w} lost and retry budget exhausted")
            }
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure of a run, identifying the originating node.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    pub node: NodeId,
    pub reason: FailureReason,
}

impl ExecutionFailure {
    /// Surface this failure as a crate error for the client.
    pub fn into_error(self) -> TaskmeshError {
        match self.reason {
            FailureReason::Cancelled => TaskmeshError::Cancelled,
            reason => TaskmeshError::ExecutionFailure {
                node: self.node,
                reason: reason.to_string(),
            },
        }
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} failed: {}", self.node, self.reason)
    }
}

/// Terminal state of a run.
#[derive(Clone)]
pub enum RunOutcome {
    /// The root resolved; carries its value.
    Done(TaskValue),
    /// The root failed; carries the originating node and underlying cause.
    Failed(ExecutionFailure),
}

impl fmt::Debug for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Done(_) => write!(f, "Done(..)"),
            RunOutcome::Failed(failure) => write!(f, "Failed({failure})"),
        }
    }
}
