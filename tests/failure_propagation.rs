// tests/failure_propagation.rs

mod common;
use crate::common::builders::{add_one, const_i64, failing, sum};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;

use taskmesh::errors::TaskmeshError;
use taskmesh::graph::{Arg, GraphBuilder};
use taskmesh::scheduler::{FailureReason, RunOutcome, SchedulerOptions, SchedulerRun};
use taskmesh_test_utils::fake_pool::FakeWorkerPool;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn failed_node_fails_dependents_without_dispatching_them() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let leaf = builder.wrap(failing("boom"), vec![]);
    let mid = builder.wrap(add_one(), vec![Arg::from(&leaf)]);
    let root = builder.wrap(add_one(), vec![Arg::from(&mid)]);
    let graph = builder.build(&root)?;

    let pool = FakeWorkerPool::new(2);
    let run = SchedulerRun::new(graph, pool.clone(), SchedulerOptions::default());
    let outcome = with_timeout(run.run()).await?;

    match outcome {
        RunOutcome::Failed(failure) => {
            // The failure identifies the originating node, not the root.
            assert_eq!(failure.node, leaf.id());
            assert_eq!(failure.reason, FailureReason::NodeError("boom".to_string()));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    assert_eq!(pool.dispatches_of("failing").len(), 1);
    assert!(
        pool.dispatches_of("add_one").is_empty(),
        "dependents of a failed node must never be dispatched"
    );
    Ok(())
}

#[tokio::test]
async fn sibling_branch_still_completes_after_failure() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let bad = builder.wrap(failing("bad branch"), vec![]);
    let good = builder.wrap(const_i64(5), vec![]);
    let root = builder.wrap(sum(), vec![Arg::from(&bad), Arg::from(&good)]);
    let graph = builder.build(&root)?;

    let pool = FakeWorkerPool::new(2);
    let run = SchedulerRun::new(graph, pool.clone(), SchedulerOptions::default());
    let outcome = with_timeout(run.run()).await?;

    match outcome {
        RunOutcome::Failed(failure) => assert_eq!(failure.node, bad.id()),
        other => panic!("expected failure, got {other:?}"),
    }

    // The healthy sibling was dispatched alongside the failing one and its
    // completion was absorbed before the run finished.
    assert_eq!(pool.dispatches_of("const").len(), 1);
    assert!(pool.dispatches_of("sum").is_empty());
    Ok(())
}

#[tokio::test]
async fn failure_surfaces_as_execution_error() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let leaf = builder.wrap(failing("division by zero"), vec![]);
    let root = builder.wrap(add_one(), vec![Arg::from(&leaf)]);
    let graph = builder.build(&root)?;

    let pool = FakeWorkerPool::new(1);
    let run = SchedulerRun::new(graph, pool, SchedulerOptions::default());
    let outcome = with_timeout(run.run()).await?;

    let failure = match outcome {
        RunOutcome::Failed(failure) => failure,
        other => panic!("expected failure, got {other:?}"),
    };

    match failure.into_error() {
        TaskmeshError::ExecutionFailure { node, reason } => {
            assert_eq!(node, leaf.id());
            assert!(reason.contains("division by zero"), "reason = {reason:?}");
        }
        other => panic!("expected ExecutionFailure, got {other:?}"),
    }
    Ok(())
}
