// src/graph/mod.rs

//! Lazy task-graph construction.
//!
//! - [`node`] defines the deferred-call data model: [`TaskNode`] and its
//!   flattened per-graph form [`GraphNode`].
//! - [`builder`] wraps function calls into nodes and flattens a root node
//!   into an [`ExecutionGraph`] by transitive closure.
//! - [`graph`] holds the validated, immutable DAG the scheduler executes.

pub mod builder;
pub mod graph;
pub mod node;

pub use builder::GraphBuilder;
pub use graph::ExecutionGraph;
pub use node::{Arg, GraphNode, Slot, TaskNode};
