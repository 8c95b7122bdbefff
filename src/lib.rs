// src/lib.rs

//! taskmesh: lazy task graphs with distributed, event-driven execution.
//!
//! Deferred calls are wrapped into [`graph::TaskNode`]s whose arguments may
//! be plain values or other nodes; nothing executes at wrap time. Asking a
//! [`graph::GraphBuilder`] to build from a chosen root flattens the node web
//! into a validated [`graph::ExecutionGraph`], which a [`Client`] then
//! schedules across a [`pool::WorkerPool`], running independent nodes in
//! parallel and each shared node exactly once.
//!
//! ```
//! use taskmesh::graph::{Arg, GraphBuilder};
//! use taskmesh::pool::LocalWorkerPool;
//! use taskmesh::types::{downcast, task_value, TaskFunc};
//! use taskmesh::Client;
//!
//! # fn main() -> taskmesh::errors::Result<()> {
//! let mut builder = GraphBuilder::new();
//! let a = builder.wrap(TaskFunc::new("one", |_| Ok(task_value(1i64))), vec![]);
//! let b = builder.wrap(TaskFunc::new("two", |_| Ok(task_value(2i64))), vec![]);
//! let sum = builder.wrap(
//!     TaskFunc::new("sum", |args| {
//!         let total: i64 = args.iter().filter_map(|v| downcast::<i64>(v).copied()).sum();
//!         Ok(task_value(total))
//!     }),
//!     vec![Arg::from(&a), Arg::from(&b)],
//! );
//! let graph = builder.build(&sum)?;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let total: i64 = runtime.block_on(async {
//!     let client = Client::with_defaults(LocalWorkerPool::with_workers(2));
//!     client.submit(graph).result_as::<i64>().await
//! })?;
//! assert_eq!(total, 3);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod pool;
pub mod scheduler;
pub mod types;

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::graph::ExecutionGraph;
use crate::pool::LocalWorkerPool;
use crate::types::TaskValue;

pub use client::{Client, ClusterStatus, RunHandle};
pub use scheduler::{RunOutcome, SchedulerOptions};

/// High-level entry point: execute a graph on a fresh local pool sized from
/// the given configuration and return the root value.
///
/// This wires together:
/// - pool construction from `[pool]`
/// - scheduler options from `[scheduler]`
/// - a single submitted run
///
/// Callers that want to reuse workers across runs, observe membership, or
/// cancel should build a [`Client`] directly.
pub async fn run_graph(graph: ExecutionGraph, config: &ConfigFile) -> Result<TaskValue> {
    let pool = LocalWorkerPool::new(config.pool.worker_ids());
    let client = Client::new(pool, config.scheduler.scheduler_options());
    client.submit(graph).result().await
}
