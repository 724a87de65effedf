// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for per-task processing outcomes.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A handler failed on one task; the worker carries on.
///
/// # Log Level
/// `warn!` - Contained failure, reported in the task's result
///
/// # Example
/// ```
/// use the_conduit::observability::messages::task::TaskProcessingFailed;
/// use the_conduit::errors::ProcessingError;
///
/// let error = ProcessingError::failed("negative input");
/// let msg = TaskProcessingFailed {
///     task_id: 4,
///     worker_id: 0,
///     error: &error,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Task 4 failed on worker 0: processing failed: negative input"
/// );
/// ```
pub struct TaskProcessingFailed<'a> {
    pub task_id: u64,
    pub worker_id: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for TaskProcessingFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task {} failed on worker {}: {}",
            self.task_id, self.worker_id, self.error
        )
    }
}

impl StructuredLog for TaskProcessingFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            task_id = self.task_id,
            worker_id = self.worker_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "task_failed",
            span_name = name,
            task_id = self.task_id,
            worker_id = self.worker_id,
        )
    }
}

/// A handler finished one task.
///
/// # Log Level
/// `trace!` - High-volume detail
pub struct TaskCompleted {
    pub task_id: u64,
    pub worker_id: usize,
    pub duration: Duration,
}

impl Display for TaskCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task {} completed on worker {} in {:?}",
            self.task_id, self.worker_id, self.duration
        )
    }
}

impl StructuredLog for TaskCompleted {
    fn log(&self) {
        tracing::trace!(
            task_id = self.task_id,
            worker_id = self.worker_id,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "task",
            span_name = name,
            task_id = self.task_id,
            worker_id = self.worker_id,
        )
    }
}
