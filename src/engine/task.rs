// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::errors::ProcessingError;

/// Newtype wrapper for task identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for the index of a worker inside its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work. Immutable once enqueued; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Task<T> {
    pub id: TaskId,
    pub payload: T,
}

impl<T> Task<T> {
    pub fn new(id: u64, payload: T) -> Self {
        Self {
            id: TaskId(id),
            payload,
        }
    }

    /// Number a sequence of payloads as tasks `0, 1, 2, ...`.
    ///
    /// Each task is built as a value before dispatch, so nothing downstream
    /// captures a shared loop variable.
    ///
    /// ```
    /// use the_conduit::engine::{Task, TaskId};
    ///
    /// let tasks: Vec<_> = Task::sequence(["a", "b"]).collect();
    /// assert_eq!(tasks[1].id, TaskId(1));
    /// assert_eq!(tasks[1].payload, "b");
    /// ```
    pub fn sequence<I>(payloads: I) -> impl Iterator<Item = Task<T>>
    where
        I: IntoIterator<Item = T>,
    {
        payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| Task::new(index as u64, payload))
    }
}

/// The outcome of processing one task.
///
/// A failed handler still produces a `TaskResult`; the error lives in
/// `outcome` so no task ever disappears silently.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult<O> {
    pub task_id: TaskId,
    pub outcome: Result<O, ProcessingError>,
    pub worker_id: WorkerId,
    pub duration: Duration,
}

impl<O> TaskResult<O> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&O> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ProcessingError> {
        self.outcome.as_ref().err()
    }
}
