#![allow(dead_code)]

pub use taskmesh_test_utils::{builders, fake_pool, init_tracing, with_timeout};

use taskmesh::errors::Result;
use taskmesh::graph::ExecutionGraph;
use taskmesh::pool::LocalWorkerPool;
use taskmesh::scheduler::{RunOutcome, SchedulerOptions, SchedulerRun};

/// Run a graph to completion on a fresh local pool with `workers` workers.
pub async fn run_local(graph: ExecutionGraph, workers: usize) -> Result<RunOutcome> {
    let pool = LocalWorkerPool::with_workers(workers);
    SchedulerRun::new(graph, pool, SchedulerOptions::default())
        .run()
        .await
}
