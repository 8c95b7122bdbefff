// tests/client_api.rs

mod common;
use crate::common::builders::{collect_i64, const_i64, fan_out, slow_const, sum};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::time::Duration;

use taskmesh::config::ConfigFile;
use taskmesh::errors::TaskmeshError;
use taskmesh::graph::{Arg, GraphBuilder};
use taskmesh::pool::LocalWorkerPool;
use taskmesh::types::downcast;
use taskmesh::{run_graph, Client};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn submit_and_downcast_result() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let root = fan_out(&mut builder, 3);
    let graph = builder.build(&root)?;

    let client = Client::with_defaults(LocalWorkerPool::with_workers(2));
    let values: Vec<i64> = with_timeout(client.submit(graph).result_as()).await?;
    assert_eq!(values, vec![0, 1, 2]);
    Ok(())
}

#[tokio::test]
async fn status_tracks_membership() -> TestResult {
    init_tracing();

    let pool = LocalWorkerPool::with_workers(3);
    let client = Client::with_defaults(pool.clone());

    let status = client.status();
    assert_eq!(status.total_workers, 3);
    assert_eq!(status.live_workers, 3);

    pool.kill_worker(&"local-1".to_string()).await;

    let status = client.status();
    assert_eq!(status.total_workers, 3);
    assert_eq!(status.live_workers, 2);
    assert!(status
        .workers
        .iter()
        .any(|w| w.id == "local-1" && !w.alive));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_fails_the_run_with_cancelled() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let slow = builder.wrap(slow_const(1, Duration::from_secs(5)), vec![]);
    let root = builder.wrap(sum(), vec![Arg::from(&slow)]);
    let graph = builder.build(&root)?;

    let client = Client::with_defaults(LocalWorkerPool::with_workers(1));
    let handle = client.submit(graph);

    // Let the slow leaf start before cancelling.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel().await;

    match with_timeout(handle.result()).await {
        Err(TaskmeshError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn independent_runs_share_the_pool() -> TestResult {
    init_tracing();

    let client = Client::with_defaults(LocalWorkerPool::with_workers(2));

    let mut first = GraphBuilder::new();
    let root_a = fan_out(&mut first, 4);
    let graph_a = first.build(&root_a)?;

    let mut second = GraphBuilder::new();
    let leaf = second.wrap(const_i64(100), vec![]);
    let root_b = second.wrap(collect_i64(), vec![Arg::from(&leaf), Arg::value(200i64)]);
    let graph_b = second.build(&root_b)?;

    let handle_a = client.submit(graph_a);
    let handle_b = client.submit(graph_b);

    let values_a: Vec<i64> = with_timeout(handle_a.result_as()).await?;
    let values_b: Vec<i64> = with_timeout(handle_b.result_as()).await?;
    assert_eq!(values_a, vec![0, 1, 2, 3]);
    assert_eq!(values_b, vec![100, 200]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_submission_proceeds_while_pool_is_busy() -> TestResult {
    init_tracing();

    let client = Client::with_defaults(LocalWorkerPool::with_workers(1));

    let mut first = GraphBuilder::new();
    let root_a = first.wrap(slow_const(1, Duration::from_millis(500)), vec![]);
    let graph_a = first.build(&root_a)?;
    let handle_a = client.submit(graph_a);

    // Submit the second run only after the first has occupied the worker.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut second = GraphBuilder::new();
    let root_b = second.wrap(const_i64(2), vec![]);
    let graph_b = second.build(&root_b)?;
    let handle_b = client.submit(graph_b);

    // The late run must not wait for the first run's call to finish.
    let b: i64 = with_timeout(handle_b.result_as()).await?;
    assert_eq!(b, 2);
    let a: i64 = with_timeout(handle_a.result_as()).await?;
    assert_eq!(a, 1);
    Ok(())
}

#[tokio::test]
async fn run_graph_uses_config_defaults() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let root = fan_out(&mut builder, 5);
    let graph = builder.build(&root)?;

    let value = with_timeout(run_graph(graph, &ConfigFile::default())).await?;
    let values = downcast::<Vec<i64>>(&value).expect("root should be Vec<i64>");
    assert_eq!(values, &vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn result_as_rejects_wrong_type() -> TestResult {
    init_tracing();

    let mut builder = GraphBuilder::new();
    let root = builder.wrap(const_i64(1), vec![]);
    let graph = builder.build(&root)?;

    let client = Client::with_defaults(LocalWorkerPool::with_workers(1));
    let res: taskmesh::errors::Result<String> =
        with_timeout(client.submit(graph).result_as()).await;
    assert!(res.is_err());
    Ok(())
}
