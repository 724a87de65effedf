// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fixed-size pool of interchangeable workers draining one task queue.
//!
//! Each worker loops: dequeue a [`Task`], run the [`TaskHandler`] on its
//! payload, publish a [`TaskResult`], repeat until the task queue is closed
//! and drained or the pool is cancelled.
//!
//! # Failure containment
//!
//! Every handler invocation runs on its own spawned task, so a handler that
//! returns an error, panics, or overruns the per-task limit produces an error
//! result for that task and the worker moves on to the next one.
//!
//! # Shutdown
//!
//! The result queue belongs to the pool. Each worker holds a
//! [`CompletionGuard`] and a coordinator closes the result queue once all of
//! them have been dropped, so the close happens exactly once and only after
//! the last worker has published its last result, even if a worker dies.
//!
//! No ordering is guaranteed between results and task submission order.
//!
//! # Examples
//!
//! ```rust
//! use the_conduit::engine::{Queue, Task, WorkerPool};
//! use the_conduit::errors::ProcessingError;
//! use the_conduit::traits::handler_fn;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let tasks = Queue::closed_with(Task::sequence(1..=8));
//! let results = Queue::new(8);
//!
//! let pool = WorkerPool::spawn(
//!     3,
//!     tasks,
//!     results.clone(),
//!     handler_fn(|n: i64| async move { Ok::<_, ProcessingError>(n * n) }),
//! )
//! .unwrap();
//!
//! let mut squares: Vec<i64> = results
//!     .collect()
//!     .await
//!     .into_iter()
//!     .filter_map(|result| result.outcome.ok())
//!     .collect();
//! squares.sort();
//! assert_eq!(squares, vec![1, 4, 9, 16, 25, 36, 49, 64]);
//!
//! let summary = pool.join().await;
//! assert_eq!(summary.processed, 8);
//! # }
//! ```

use serde::Serialize;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::engine::completion::{close_when_complete, CompletionCounter, CompletionGuard};
use crate::engine::{Queue, Task, TaskResult, WorkerId};
use crate::errors::{EngineError, ProcessingError};
use crate::observability::messages::engine::{
    EnqueueRejected, ExitReason, TaskEndedAbnormally, WorkerExited, WorkerStarted,
};
use crate::observability::messages::task::{TaskCompleted, TaskProcessingFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::TaskHandler;

const POOL_OWNER: &str = "worker pool";

/// Counters shared by all workers of one pool.
#[derive(Debug, Default)]
struct PoolStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    /// Tasks whose result was placed in the result queue, successful or not.
    pub processed: u64,
    /// Results that carried a processing error.
    pub failed: u64,
}

/// Configures and spawns a [`WorkerPool`].
pub struct WorkerPoolBuilder {
    worker_count: usize,
    task_timeout: Option<Duration>,
    cancellation: CancellationToken,
}

impl WorkerPoolBuilder {
    /// Bound every handler invocation; overruns become
    /// [`ProcessingError::TimedOut`] results.
    pub fn task_timeout(mut self, limit: Duration) -> Self {
        self.task_timeout = Some(limit);
        self
    }

    /// Stop the workers when `token` is cancelled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn spawn<I, O, H>(
        self,
        tasks: Queue<Task<I>>,
        results: Queue<TaskResult<O>>,
        handler: H,
    ) -> Result<WorkerPool, EngineError>
    where
        I: Send + 'static,
        O: Send + 'static,
        H: TaskHandler<I, O> + 'static,
    {
        self.spawn_shared(tasks, results, Arc::new(handler))
    }

    /// Like [`spawn`](Self::spawn) for a handler that is already shared.
    pub fn spawn_shared<I, O>(
        self,
        tasks: Queue<Task<I>>,
        results: Queue<TaskResult<O>>,
        handler: Arc<dyn TaskHandler<I, O>>,
    ) -> Result<WorkerPool, EngineError>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        if self.worker_count == 0 {
            return Err(EngineError::InvalidArgument {
                name: "worker_count",
                reason: "a worker pool needs at least one worker".to_string(),
            });
        }

        let counter = Arc::new(CompletionCounter::new(self.worker_count));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..self.worker_count)
            .map(|index| {
                let worker = Worker {
                    id: WorkerId(index),
                    tasks: tasks.clone(),
                    results: results.clone(),
                    handler: Arc::clone(&handler),
                    task_timeout: self.task_timeout,
                    cancellation: self.cancellation.clone(),
                    stats: Arc::clone(&stats),
                };
                let started = WorkerStarted {
                    worker_id: index,
                    pool_size: self.worker_count,
                };
                let span = started.span("worker_loop");
                let guard = CompletionGuard::new(Arc::clone(&counter));
                tokio::spawn(
                    async move {
                        started.log();
                        worker.run(guard).await;
                    }
                    .instrument(span),
                )
            })
            .collect();

        let coordinator = close_when_complete(counter, results, POOL_OWNER);

        Ok(WorkerPool {
            workers,
            coordinator,
            cancellation: self.cancellation,
            stats,
        })
    }
}

/// Handle to a running worker pool.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    coordinator: JoinHandle<()>,
    cancellation: CancellationToken,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    pub fn builder(worker_count: usize) -> WorkerPoolBuilder {
        WorkerPoolBuilder {
            worker_count,
            task_timeout: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Spawn `worker_count` workers draining `tasks` into `results`.
    ///
    /// The pool takes ownership of closing `results`.
    pub fn spawn<I, O, H>(
        worker_count: usize,
        tasks: Queue<Task<I>>,
        results: Queue<TaskResult<O>>,
        handler: H,
    ) -> Result<Self, EngineError>
    where
        I: Send + 'static,
        O: Send + 'static,
        H: TaskHandler<I, O> + 'static,
    {
        Self::builder(worker_count).spawn(tasks, results, handler)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Ask every worker to stop after its current task.
    ///
    /// A worker that is running a handler still publishes that task's result,
    /// so keep draining the result queue until it closes. Tasks still in the
    /// task queue are left there.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            processed: self.stats.processed.load(Ordering::Acquire),
            failed: self.stats.failed.load(Ordering::Acquire),
        }
    }

    /// Wait for every worker and for the result queue to be closed.
    pub async fn join(self) -> PoolSummary {
        for handle in self.workers {
            if let Err(error) = handle.await {
                TaskEndedAbnormally {
                    task: "worker",
                    error: &error,
                }
                .log();
            }
        }
        if let Err(error) = self.coordinator.await {
            TaskEndedAbnormally {
                task: "worker pool coordinator",
                error: &error,
            }
            .log();
        }
        PoolSummary {
            processed: self.stats.processed.load(Ordering::Acquire),
            failed: self.stats.failed.load(Ordering::Acquire),
        }
    }
}

struct Worker<I, O> {
    id: WorkerId,
    tasks: Queue<Task<I>>,
    results: Queue<TaskResult<O>>,
    handler: Arc<dyn TaskHandler<I, O>>,
    task_timeout: Option<Duration>,
    cancellation: CancellationToken,
    stats: Arc<PoolStats>,
}

impl<I, O> Worker<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// The guard is held for the whole loop and released on every exit path.
    ///
    /// Cancellation is only observed while waiting for the next task. A task
    /// that has been taken always ends up as a result.
    async fn run(self, _guard: CompletionGuard) {
        let mut processed = 0u64;
        let reason = loop {
            let task = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => break ExitReason::Cancelled,
                next = self.tasks.dequeue() => match next {
                    Some(task) => task,
                    None => break ExitReason::Drained,
                },
            };

            let task_id = task.id;
            let started = Instant::now();
            let outcome = match self.execute(task.payload).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    TaskEndedAbnormally {
                        task: "handler",
                        error: &error,
                    }
                    .log();
                    break ExitReason::RuntimeShutdown;
                }
            };
            let duration = started.elapsed();
            let failed = self.log_outcome(task_id.0, &outcome, duration);

            let result = TaskResult {
                task_id,
                outcome,
                worker_id: self.id,
                duration,
            };
            if self.results.enqueue(result).await.is_err() {
                EnqueueRejected { owner: POOL_OWNER }.log();
                break ExitReason::ResultQueueClosed;
            }

            processed += 1;
            self.stats.processed.fetch_add(1, Ordering::AcqRel);
            if failed {
                self.stats.failed.fetch_add(1, Ordering::AcqRel);
            }
        };

        WorkerExited {
            worker_id: self.id.0,
            processed,
            reason,
        }
        .log();
    }

    /// Run the handler in isolation. `Err` means the runtime itself refused.
    async fn execute(&self, payload: I) -> Result<Result<O, ProcessingError>, JoinError> {
        let handler = Arc::clone(&self.handler);
        let mut invocation = tokio::spawn(async move { handler.handle(payload).await });

        let joined = match self.task_timeout {
            None => invocation.await,
            Some(limit) => match tokio::time::timeout(limit, &mut invocation).await {
                Ok(joined) => joined,
                Err(_) => {
                    invocation.abort();
                    return Ok(Err(ProcessingError::TimedOut { limit }));
                }
            },
        };

        match joined {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_panic() => Ok(Err(ProcessingError::Panicked {
                message: panic_message(e.into_panic()),
            })),
            Err(e) => Err(e),
        }
    }

    /// Log how the task went. Returns `true` for a failure.
    fn log_outcome(
        &self,
        task_id: u64,
        outcome: &Result<O, ProcessingError>,
        duration: Duration,
    ) -> bool {
        match outcome {
            Ok(_) => {
                TaskCompleted {
                    task_id,
                    worker_id: self.id.0,
                    duration,
                }
                .log();
                false
            }
            Err(error) => {
                TaskProcessingFailed {
                    task_id,
                    worker_id: self.id.0,
                    error,
                }
                .log();
                true
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
