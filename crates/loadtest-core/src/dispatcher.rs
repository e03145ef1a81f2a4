//! Paced tick dispatch over an elastic worker pool
//!
//! The dispatcher owns the pacing loop and every worker task. Workers never
//! observe the stop signal: the dispatcher reacts to it by closing the tick
//! channel, after which workers finish their in-flight request and exit.
//!
//! Shutdown order is fixed: close ticks, join all workers, close the result
//! stream, then trigger the stop signal so any other waiter unblocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::LoadTestArgs;
use crate::pacer::{Pace, Pacer};
use crate::result::{RequestResult, RunState};
use crate::stop::StopSignal;
use crate::tick::{self, TickReceiver, TickSender, TryTickError};
use crate::worker::{RequestTemplate, Worker};

/// Why the dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitReason {
    DurationElapsed,
    PacingOverflow,
    Stopped,
    PoolClosed,
}

pub(crate) struct Dispatcher {
    args: Arc<LoadTestArgs>,
    pacer: Pacer,
    stop: StopSignal,
    template: Arc<RequestTemplate>,
    state: Arc<RunState>,
    ticks: TickSender,
    tick_source: TickReceiver,
    results: mpsc::Sender<RequestResult>,
    pool: JoinSet<()>,
    workers: Arc<AtomicU64>,
}

impl Dispatcher {
    pub(crate) fn new(
        args: Arc<LoadTestArgs>,
        template: Arc<RequestTemplate>,
        stop: StopSignal,
        results: mpsc::Sender<RequestResult>,
        workers: Arc<AtomicU64>,
    ) -> Self {
        let (ticks, tick_source) = tick::channel();
        Self {
            pacer: Pacer::new(args.qps),
            args,
            stop,
            template,
            state: Arc::new(RunState::new()),
            ticks,
            tick_source,
            results,
            pool: JoinSet::new(),
            workers,
        }
    }

    /// Drive the run to completion.
    pub(crate) async fn run(mut self) -> ExitReason {
        for _ in 0..self.args.workers {
            self.spawn_worker();
        }

        let reason = self.dispatch().await;
        info!(
            reason = ?reason,
            elapsed_ms = self.state.elapsed().as_millis() as u64,
            workers = self.worker_count(),
            "load generation finished, draining workers"
        );

        self.drain().await;
        reason
    }

    async fn dispatch(&mut self) -> ExitReason {
        let deadline = self.args.deadline();
        let mut sent: u64 = 0;

        loop {
            let elapsed = self.state.elapsed();
            if deadline.is_some_and(|deadline| elapsed > deadline) {
                return ExitReason::DurationElapsed;
            }

            let wait = match self.pacer.pace(elapsed, sent) {
                Pace::Wait(wait) => wait,
                Pace::Stop => {
                    warn!(sent, "pacing schedule overflowed, stopping run");
                    return ExitReason::PacingOverflow;
                }
            };

            if sleep_or_stop(&self.stop, wait).await {
                return ExitReason::Stopped;
            }

            if self.can_grow() {
                match self.ticks.try_send() {
                    Ok(()) => {
                        sent += 1;
                        continue;
                    }
                    // No idle worker: grow by one, then hand the same tick over below.
                    Err(TryTickError::NoIdleWorker) => self.spawn_worker(),
                    Err(TryTickError::Closed) => return ExitReason::PoolClosed,
                }
            }

            tokio::select! {
                biased;
                _ = self.stop.triggered() => return ExitReason::Stopped,
                handed = self.ticks.send() => match handed {
                    Ok(()) => sent += 1,
                    Err(TryTickError::Closed | TryTickError::NoIdleWorker) => {
                        return ExitReason::PoolClosed
                    }
                },
            }
        }
    }

    fn can_grow(&self) -> bool {
        self.args.autoscale && self.worker_count() < self.args.max_workers
    }

    fn worker_count(&self) -> u64 {
        self.workers.load(Ordering::Acquire)
    }

    fn spawn_worker(&mut self) {
        let id = self.workers.fetch_add(1, Ordering::AcqRel);
        let worker = Worker {
            id,
            template: Arc::clone(&self.template),
            state: Arc::clone(&self.state),
            ticks: self.tick_source.clone(),
            results: self.results.clone(),
        };
        self.pool.spawn(worker.run());
        debug!(worker = id, total = id + 1, "spawned worker");
    }

    async fn drain(self) {
        let Self {
            ticks,
            tick_source,
            results,
            mut pool,
            stop,
            ..
        } = self;

        drop(tick_source);
        ticks.close().await;

        let mut joined = 0u64;
        while let Some(outcome) = pool.join_next().await {
            match outcome {
                Ok(()) => joined += 1,
                Err(e) => warn!(error = %e, "worker task failed"),
            }
        }
        debug!(joined, "all workers joined");

        drop(results);
        stop.trigger();
    }
}

/// Sleep for `wait`. Returns `true` if the run was stopped meanwhile.
async fn sleep_or_stop(stop: &StopSignal, wait: Duration) -> bool {
    if stop.is_triggered() {
        return true;
    }
    if wait.is_zero() {
        return false;
    }

    tokio::select! {
        _ = tokio::time::sleep(wait) => false,
        _ = stop.triggered() => true,
    }
}
