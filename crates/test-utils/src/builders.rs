#![allow(dead_code)]

//! Graph fixtures shared by the integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskmesh::graph::{Arg, GraphBuilder, TaskNode};
use taskmesh::types::{downcast, task_value, TaskFunc, TaskValue};

/// Function that ignores its arguments and returns a constant.
pub fn const_i64(v: i64) -> TaskFunc {
    TaskFunc::new("const", move |_| Ok(task_value(v)))
}

/// `args[0] + 1`.
pub fn add_one() -> TaskFunc {
    TaskFunc::new("add_one", |args: &[TaskValue]| {
        let x = downcast::<i64>(&args[0])
            .copied()
            .ok_or_else(|| "add_one expects an i64 argument".to_string())?;
        Ok(task_value(x + 1))
    })
}

/// Sum of all `i64` arguments.
pub fn sum() -> TaskFunc {
    TaskFunc::new("sum", |args: &[TaskValue]| {
        let total: i64 = args
            .iter()
            .filter_map(|a| downcast::<i64>(a).copied())
            .sum();
        Ok(task_value(total))
    })
}

/// Collect all `i64` arguments into a `Vec<i64>` preserving slot order.
pub fn collect_i64() -> TaskFunc {
    TaskFunc::new("collect", |args: &[TaskValue]| {
        let values: Vec<i64> = args
            .iter()
            .filter_map(|a| downcast::<i64>(a).copied())
            .collect();
        Ok(task_value(values))
    })
}

/// Function that always fails with the given message.
pub fn failing(msg: &str) -> TaskFunc {
    let msg = msg.to_string();
    TaskFunc::new("failing", move |_| Err(msg.clone()))
}

/// Constant that counts its invocations, for exactly-once assertions.
pub fn counting_const(v: i64, counter: Arc<AtomicUsize>) -> TaskFunc {
    TaskFunc::new("counting_const", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(task_value(v))
    })
}

/// Constant that sleeps before returning, for parallelism timing tests.
pub fn slow_const(v: i64, delay: Duration) -> TaskFunc {
    TaskFunc::new("slow_const", move |_| {
        std::thread::sleep(delay);
        Ok(task_value(v))
    })
}

/// Fan-out fixture: `n` constant leaves (values `0..n`) collected by a
/// single root in declared order. Returns the root node.
pub fn fan_out(builder: &mut GraphBuilder, n: i64) -> TaskNode {
    let leaves: Vec<TaskNode> = (0..n).map(|i| builder.wrap(const_i64(i), vec![])).collect();
    builder.wrap(collect_i64(), leaves.iter().map(Arg::from).collect())
}

/// Diamond fixture: one shared leaf feeding two middle nodes feeding the
/// root. The leaf counts invocations. Returns `(root, shared_leaf)`.
pub fn diamond(builder: &mut GraphBuilder, counter: Arc<AtomicUsize>) -> (TaskNode, TaskNode) {
    let shared = builder.wrap(counting_const(10, counter), vec![]);
    let left = builder.wrap(add_one(), vec![Arg::from(&shared)]);
    let right = builder.wrap(add_one(), vec![Arg::from(&shared)]);
    let root = builder.wrap(sum(), vec![Arg::from(&left), Arg::from(&right)]);
    (root, shared)
}
