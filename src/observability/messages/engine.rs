// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for engine lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Run lifecycle (start, completion)
//! * Worker start and exit
//! * Queue closure by its owner
//! * Stage state transitions
//! * Fan-out / fan-in completion
//! * Timeout gate outcomes
//! * Misuse and abnormal task ends

use crate::errors::EngineError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::task::JoinError;
use tracing::Span;

/// A configured run started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_conduit::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     strategy: "worker_pool",
///     input_count: 8,
///     workers: 3,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStarted<'a> {
    pub strategy: &'a str,
    pub input_count: usize,
    pub workers: usize,
}

impl Display for RunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting {} run: {} inputs, workers={}",
            self.strategy, self.input_count, self.workers
        )
    }
}

impl StructuredLog for RunStarted<'_> {
    fn log(&self) {
        tracing::info!(
            strategy = self.strategy,
            input_count = self.input_count,
            workers = self.workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            strategy = self.strategy,
            input_count = self.input_count,
            workers = self.workers,
        )
    }
}

/// A configured run finished draining its final queue.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_conduit::observability::messages::engine::RunCompleted;
/// use std::time::Duration;
///
/// let msg = RunCompleted {
///     strategy: "pipeline",
///     output_count: 6,
///     failed_count: 0,
///     timed_out: false,
///     duration: Duration::from_millis(12),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunCompleted<'a> {
    pub strategy: &'a str,
    pub output_count: usize,
    pub failed_count: usize,
    pub timed_out: bool,
    pub duration: Duration,
}

impl Display for RunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} run completed: {} outputs, {} failures in {:?}",
            self.strategy, self.output_count, self.failed_count, self.duration
        )?;
        if self.timed_out {
            write!(f, " (consumer timed out)")?;
        }
        Ok(())
    }
}

impl StructuredLog for RunCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            strategy = self.strategy,
            output_count = self.output_count,
            failed_count = self.failed_count,
            timed_out = self.timed_out,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_completed",
            span_name = name,
            strategy = self.strategy,
            output_count = self.output_count,
            duration = ?self.duration,
        )
    }
}

/// A worker entered its dequeue loop.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct WorkerStarted {
    pub worker_id: usize,
    pub pool_size: usize,
}

impl Display for WorkerStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} of {} started",
            self.worker_id, self.pool_size
        )
    }
}

impl StructuredLog for WorkerStarted {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            pool_size = self.pool_size,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "worker",
            span_name = name,
            worker_id = self.worker_id,
            pool_size = self.pool_size,
        )
    }
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The task queue reported closed and drained.
    Drained,
    /// The cancellation token fired.
    Cancelled,
    /// The result queue was closed underneath the worker.
    ResultQueueClosed,
    /// The runtime refused to run the handler (shutdown).
    RuntimeShutdown,
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let text = match self {
            ExitReason::Drained => "input drained",
            ExitReason::Cancelled => "cancelled",
            ExitReason::ResultQueueClosed => "result queue closed",
            ExitReason::RuntimeShutdown => "runtime shutting down",
        };
        f.write_str(text)
    }
}

/// A worker left its loop and released its completion slot.
///
/// # Log Level
/// `debug!` - Lifecycle detail
///
/// # Example
/// ```
/// use the_conduit::observability::messages::engine::{ExitReason, WorkerExited};
///
/// let msg = WorkerExited {
///     worker_id: 1,
///     processed: 12,
///     reason: ExitReason::Drained,
/// };
///
/// assert_eq!(msg.to_string(), "Worker 1 exited after 12 tasks: input drained");
/// ```
pub struct WorkerExited {
    pub worker_id: usize,
    pub processed: u64,
    pub reason: ExitReason,
}

impl Display for WorkerExited {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} exited after {} tasks: {}",
            self.worker_id, self.processed, self.reason
        )
    }
}

impl StructuredLog for WorkerExited {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            processed = self.processed,
            reason = %self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "worker_exited",
            span_name = name,
            worker_id = self.worker_id,
            reason = %self.reason,
        )
    }
}

/// The owner of a queue closed it after every producer finished.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct QueueClosedByOwner<'a> {
    pub owner: &'a str,
    pub buffered: usize,
}

impl Display for QueueClosedByOwner<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} closed its output queue with {} values still buffered",
            self.owner, self.buffered
        )
    }
}

impl StructuredLog for QueueClosedByOwner<'_> {
    fn log(&self) {
        tracing::debug!(owner = self.owner, buffered = self.buffered, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "queue_closed",
            span_name = name,
            owner = self.owner,
            buffered = self.buffered,
        )
    }
}

/// An engine-owned loop tried to publish into a queue someone else closed.
///
/// # Log Level
/// `error!` - Programmer error: a queue was closed by something other than its owner
pub struct EnqueueRejected<'a> {
    pub owner: &'a str,
}

impl Display for EnqueueRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} could not publish: its output queue was closed by another party",
            self.owner
        )
    }
}

impl StructuredLog for EnqueueRejected<'_> {
    fn log(&self) {
        tracing::error!(owner = self.owner, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("enqueue_rejected", span_name = name, owner = self.owner)
    }
}

/// An owner went to close its queue and found it already closed.
///
/// # Log Level
/// `error!` - Programmer error: a queue was closed by something other than its owner
///
/// # Example
/// ```
/// use the_conduit::observability::messages::engine::QueueClosedElsewhere;
///
/// let msg = QueueClosedElsewhere { owner: "fan-out" };
/// assert_eq!(
///     msg.to_string(),
///     "fan-out found its output queue already closed by another party"
/// );
/// ```
pub struct QueueClosedElsewhere<'a> {
    pub owner: &'a str,
}

impl Display for QueueClosedElsewhere<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} found its output queue already closed by another party",
            self.owner
        )
    }
}

impl StructuredLog for QueueClosedElsewhere<'_> {
    fn log(&self) {
        tracing::error!(owner = self.owner, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("queue_closed_elsewhere", span_name = name, owner = self.owner)
    }
}

/// A spawned engine task panicked or was aborted instead of returning.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct TaskEndedAbnormally<'a> {
    /// What the task was, e.g. `worker`, `stage 'square'`, `result router`.
    pub task: &'a str,
    pub error: &'a JoinError,
}

impl Display for TaskEndedAbnormally<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} task ended abnormally: {}", self.task, self.error)
    }
}

impl StructuredLog for TaskEndedAbnormally<'_> {
    fn log(&self) {
        tracing::error!(
            task = self.task,
            panicked = self.error.is_panic(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("task_ended_abnormally", span_name = name, task = self.task)
    }
}

/// A completion guard released a slot its counter never had.
///
/// # Log Level
/// `error!` - Programmer error: more guards than counted producers
pub struct CompletionSlotMissing<'a> {
    pub error: &'a EngineError,
}

impl Display for CompletionSlotMissing<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Completion guard released a slot that did not exist: {}",
            self.error
        )
    }
}

impl StructuredLog for CompletionSlotMissing<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("completion_slot_missing", span_name = name)
    }
}

/// A pipeline stage moved between lifecycle states.
///
/// # Log Level
/// `debug!` - Lifecycle detail
///
/// # Example
/// ```
/// use the_conduit::observability::messages::engine::StageStateChanged;
///
/// let msg = StageStateChanged {
///     stage_id: "square",
///     from: "running",
///     to: "draining",
/// };
///
/// assert_eq!(msg.to_string(), "Stage 'square': running -> draining");
/// ```
pub struct StageStateChanged<'a> {
    pub stage_id: &'a str,
    pub from: &'a str,
    pub to: &'a str,
}

impl Display for StageStateChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}': {} -> {}", self.stage_id, self.from, self.to)
    }
}

impl StructuredLog for StageStateChanged<'_> {
    fn log(&self) {
        tracing::debug!(
            stage_id = self.stage_id,
            from = self.from,
            to = self.to,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("stage", span_name = name, stage_id = self.stage_id)
    }
}

/// The fan-out dispatcher consumed its whole input.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct DispatchCompleted {
    pub outputs: usize,
    pub dispatched: u64,
}

impl Display for DispatchCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Fan-out dispatched {} values across {} outputs",
            self.dispatched, self.outputs
        )
    }
}

impl StructuredLog for DispatchCompleted {
    fn log(&self) {
        tracing::debug!(
            outputs = self.outputs,
            dispatched = self.dispatched,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("fan_out", span_name = name, outputs = self.outputs)
    }
}

/// Every fan-in input was exhausted.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct MergeCompleted {
    pub inputs: usize,
}

impl Display for MergeCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Fan-in merged all {} inputs", self.inputs)
    }
}

impl StructuredLog for MergeCompleted {
    fn log(&self) {
        tracing::debug!(inputs = self.inputs, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("fan_in", span_name = name, inputs = self.inputs)
    }
}

/// A timed receive gave up. This is an outcome, not a failure.
///
/// # Log Level
/// `debug!` - Expected outcome; callers decide whether to retry
pub struct ReceiveTimedOut {
    pub timeout: Duration,
}

impl Display for ReceiveTimedOut {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Receive timed out after {:?}", self.timeout)
    }
}

impl StructuredLog for ReceiveTimedOut {
    fn log(&self) {
        tracing::debug!(
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("receive_timeout", span_name = name, timeout = ?self.timeout)
    }
}

/// A request result arrived after its caller stopped waiting.
///
/// # Log Level
/// `debug!` - Expected under timeouts
pub struct LateResultDiscarded {
    pub task_id: u64,
}

impl Display for LateResultDiscarded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Discarding result for task {}: caller no longer waiting",
            self.task_id
        )
    }
}

impl StructuredLog for LateResultDiscarded {
    fn log(&self) {
        tracing::debug!(task_id = self.task_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("late_result", span_name = name, task_id = self.task_id)
    }
}
