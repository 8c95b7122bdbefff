// src/scheduler/runtime.rs

//! Async IO shell around the pure scheduler core.
//!
//! [`SchedulerRun`] owns one run end to end: it reads [`SchedulerEvent`]s off
//! the run's channel, feeds them into [`SchedulerCore`], and executes the
//! returned commands against the [`WorkerPool`]. All scheduling decisions
//! live in the core; this module only moves data across the async boundary.

use std::collections::VecDeque;
use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::graph::ExecutionGraph;
use crate::pool::WorkerPool;
use crate::scheduler::core::{SchedulerCommand, SchedulerCore};
use crate::scheduler::{RunOutcome, SchedulerEvent, SchedulerOptions};

pub struct SchedulerRun<P: WorkerPool> {
    core: SchedulerCore,
    events_rx: mpsc::Receiver<SchedulerEvent>,
    events_tx: mpsc::Sender<SchedulerEvent>,
    pool: P,
}

impl<P: WorkerPool> fmt::Debug for SchedulerRun<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerRun")
            .field("root", &self.core.graph().root())
            .field("nodes", &self.core.graph().len())
            .finish_non_exhaustive()
    }
}

impl<P: WorkerPool> SchedulerRun<P> {
    /// Wire up a run: creates the event channel, registers it for membership
    /// notifications, and seeds the core with the pool's current membership.
    pub fn new(graph: ExecutionGraph, mut pool: P, options: SchedulerOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel::<SchedulerEvent>(options.event_capacity);
        pool.watch_membership(events_tx.clone());
        let core = SchedulerCore::new(graph, pool.membership(), options);

        Self {
            core,
            events_rx,
            events_tx,
            pool,
        }
    }

    /// Sender for injecting events into this run. The client uses it to
    /// deliver [`SchedulerEvent::CancelRequested`].
    pub fn events_sender(&self) -> mpsc::Sender<SchedulerEvent> {
        self.events_tx.clone()
    }

    /// Drive the run to its terminal state.
    pub async fn run(mut self) -> Result<RunOutcome> {
        let step = self.core.start();
        if let Some(outcome) = self.execute(step.commands).await? {
            return Ok(outcome);
        }

        loop {
            let Some(event) = self.events_rx.recv().await else {
                // All senders dropped while work was still outstanding.
                return Err(
                    anyhow!("scheduler event channel closed before the run finished").into(),
                );
            };

            debug!(?event, "run received event");
            let step = self.core.step(event);
            if let Some(outcome) = self.execute(step.commands).await? {
                return Ok(outcome);
            }
        }
    }

    /// Execute the commands from a core step, plus any follow-up commands
    /// produced while recovering from refused dispatches. Returns the run
    /// outcome once a `Finish` command is seen.
    async fn execute(&mut self, commands: Vec<SchedulerCommand>) -> Result<Option<RunOutcome>> {
        let mut queue: VecDeque<SchedulerCommand> = commands.into();
        let mut finished = None;

        while let Some(command) = queue.pop_front() {
            match command {
                SchedulerCommand::Dispatch(assignments) => {
                    let mut pending: VecDeque<_> = assignments.into();
                    while let Some(assignment) = pending.pop_front() {
                        debug!(
                            node = %assignment.call.node,
                            worker = %assignment.worker,
                            attempt = assignment.call.attempt,
                            "dispatching call"
                        );
                        let dispatched = self
                            .pool
                            .dispatch(&assignment.worker, assignment.call, &self.events_tx)
                            .await;
                        if let Err(err) = dispatched {
                            // The pool refused the worker (raced with its
                            // departure); report the loss so the core
                            // reschedules the node.
                            debug!(
                                worker = %assignment.worker,
                                error = %err,
                                "dispatch refused; reporting worker loss"
                            );
                            let step = self.core.step(SchedulerEvent::WorkerLeft {
                                worker: assignment.worker,
                            });
                            for command in step.commands {
                                match command {
                                    SchedulerCommand::Dispatch(more) => pending.extend(more),
                                    other => queue.push_back(other),
                                }
                            }
                        }
                    }
                }
                SchedulerCommand::Abandon(nodes) => {
                    debug!(?nodes, "abandoning outstanding dispatches");
                    self.pool.abandon(&nodes).await?;
                }
                SchedulerCommand::Finish(outcome) => {
                    info!(?outcome, "run finished");
                    finished = Some(outcome);
                }
            }
        }

        Ok(finished)
    }
}
