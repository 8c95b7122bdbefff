// tests/scheduler_property.rs

//! Property tests driving the pure scheduler core synchronously, with no
//! Tokio involved: dispatched calls are invoked inline and completions fed
//! back as events.

use std::collections::HashSet;

use proptest::prelude::*;

use taskmesh::graph::{Arg, GraphBuilder, TaskNode};
use taskmesh::pool::Worker;
use taskmesh::scheduler::{
    Assignment, CompletionOutcome, RunOutcome, SchedulerCommand, SchedulerCore, SchedulerEvent,
    SchedulerOptions, SchedulerStep,
};
use taskmesh::types::{downcast, task_value, NodeId, TaskFunc, TaskValue};

/// A random DAG shape: `deps[i]` is the set of earlier nodes node `i`
/// depends on. Acyclic by construction.
fn dag_shape(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        let mut deps: Vec<usize> = potential
                            .into_iter()
                            .filter(|_| i > 0)
                            .map(|d| d % i)
                            .collect::<HashSet<_>>()
                            .into_iter()
                            .collect();
                        deps.sort();
                        deps
                    })
                    .collect()
            },
        )
    })
}

/// Node `i` computes `i + sum(dep values)`; the extra root sums everything.
fn node_func(i: i64) -> TaskFunc {
    TaskFunc::new("node", move |args: &[TaskValue]| {
        let total: i64 = args
            .iter()
            .filter_map(|a| downcast::<i64>(a).copied())
            .sum();
        Ok(task_value(i + total))
    })
}

/// Reference evaluation of the same shape, sequential and obviously correct.
fn expected_values(deps: &[Vec<usize>]) -> Vec<i64> {
    let mut values = Vec::with_capacity(deps.len());
    for (i, node_deps) in deps.iter().enumerate() {
        let total: i64 = node_deps.iter().map(|&d| values[d]).sum();
        values.push(i as i64 + total);
    }
    values
}

fn assignments_of(step: &SchedulerStep) -> Vec<Assignment> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            SchedulerCommand::Dispatch(a) => Some(a.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn finish_of(step: &SchedulerStep) -> Option<RunOutcome> {
    step.commands.iter().find_map(|c| match c {
        SchedulerCommand::Finish(outcome) => Some(outcome.clone()),
        _ => None,
    })
}

/// Invoke dispatched calls FIFO until the run finishes, recording every
/// dispatched node id.
fn drive(core: &mut SchedulerCore, dispatched: &mut Vec<NodeId>) -> RunOutcome {
    let mut step = core.start();
    let mut pending = assignments_of(&step);
    dispatched.extend(pending.iter().map(|a| a.call.node));
    if let Some(outcome) = finish_of(&step) {
        return outcome;
    }

    let mut guard = 0;
    loop {
        guard += 1;
        assert!(guard < 100_000, "run did not terminate");
        assert!(!pending.is_empty(), "run stalled with no work in flight");

        let assignment = pending.remove(0);
        let outcome = match assignment.call.func.invoke(&assignment.call.args) {
            Ok(v) => CompletionOutcome::Success(v),
            Err(e) => CompletionOutcome::Failed(e),
        };
        step = core.step(SchedulerEvent::NodeFinished {
            node: assignment.call.node,
            worker: assignment.worker,
            outcome,
        });

        let new = assignments_of(&step);
        dispatched.extend(new.iter().map(|a| a.call.node));
        pending.extend(new);
        if let Some(outcome) = finish_of(&step) {
            return outcome;
        }
    }
}

proptest! {
    /// For any DAG shape and worker count, the run terminates, dispatches
    /// every node exactly once, and the root value matches a sequential
    /// reference evaluation.
    #[test]
    fn random_dags_compute_the_sequential_result(
        deps in dag_shape(12),
        worker_count in 1..5usize,
    ) {
        let mut builder = GraphBuilder::new();
        let mut nodes: Vec<TaskNode> = Vec::with_capacity(deps.len());
        for (i, node_deps) in deps.iter().enumerate() {
            let args = node_deps.iter().map(|&d| Arg::from(&nodes[d])).collect();
            nodes.push(builder.wrap(node_func(i as i64), args));
        }
        // Extra root keeps every node reachable regardless of shape.
        let root = builder.wrap(
            TaskFunc::new("root", |args: &[TaskValue]| {
                let total: i64 = args
                    .iter()
                    .filter_map(|a| downcast::<i64>(a).copied())
                    .sum();
                Ok(task_value(total))
            }),
            nodes.iter().map(Arg::from).collect(),
        );
        let graph = builder.build(&root).unwrap();

        let values = expected_values(&deps);
        let expected: i64 = values.iter().sum();

        let workers: Vec<Worker> = (0..worker_count)
            .map(|i| Worker::idle(format!("w{i}")))
            .collect();
        let mut core = SchedulerCore::new(graph, workers, SchedulerOptions::default());

        let mut dispatched = Vec::new();
        let outcome = drive(&mut core, &mut dispatched);

        match outcome {
            RunOutcome::Done(value) => {
                prop_assert_eq!(downcast::<i64>(&value).copied(), Some(expected));
            }
            other => prop_assert!(false, "run failed: {:?}", other),
        }

        // Every node ran exactly once.
        let unique: HashSet<NodeId> = dispatched.iter().copied().collect();
        prop_assert_eq!(unique.len(), dispatched.len(), "a node was dispatched twice");
        prop_assert_eq!(dispatched.len(), deps.len() + 1);
    }
}
