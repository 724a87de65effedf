// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors produced while executing work inside the engine.
//!
//! Propagation follows two rules:
//! * per-task failures ([`ProcessingError`]) are contained in that task's
//!   result and never stop sibling tasks;
//! * structural failures ([`EngineError`]) are returned to the caller that
//!   wired the engine together.

use std::time::Duration;

use crate::errors::QueueError;

/// A handler failed on one task.
///
/// Carried inside a [`TaskResult`](crate::engine::TaskResult); a worker that
/// produces one of these keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    /// The handler returned an error for this task.
    #[error("processing failed: {message}")]
    Failed { message: String },

    /// The handler panicked. The worker recovered and moved on.
    #[error("handler panicked: {message}")]
    Panicked { message: String },

    /// The handler did not finish within the per-task time limit.
    #[error("handler exceeded its time limit of {limit:?}")]
    TimedOut { limit: Duration },
}

impl ProcessingError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessingError::Failed {
            message: message.into(),
        }
    }
}

/// Structural errors raised while wiring or coordinating the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A constructor received an argument it cannot work with.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// A completion counter was decremented more times than it was incremented.
    #[error("completion counter decremented below zero")]
    CounterUnderflow,

    /// A completion counter was incremented after it already reached zero.
    #[error("completion counter already released; it cannot be re-armed")]
    CounterReleased,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Errors seen by a caller of [`RequestDispatcher::call`](crate::engine::RequestDispatcher::call).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The dispatcher has been shut down and accepts no new requests.
    #[error("dispatcher is shut down")]
    Submit,

    /// No result arrived before the deadline.
    #[error("no result within {0:?}")]
    TimedOut(Duration),

    /// The result router stopped before this request was answered.
    #[error("result router stopped before the request completed")]
    Dropped,
}
