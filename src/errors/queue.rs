// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by misuse of a [`Queue`](crate::engine::Queue).
//!
//! Both are programmer errors: they are surfaced to the caller immediately and
//! never swallowed by the engine.

use std::fmt;

/// Returned by `enqueue` when the queue has already been closed.
///
/// The rejected value is handed back so the caller can decide what to do with it.
#[derive(PartialEq, Eq)]
pub struct ClosedQueueError<T>(pub T);

impl<T> ClosedQueueError<T> {
    /// Recover the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for ClosedQueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosedQueueError").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for ClosedQueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue attempted on a closed queue")
    }
}

impl<T> std::error::Error for ClosedQueueError<T> {}

/// Structural queue errors that do not carry a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// `close` was called on a queue that is already closed.
    ///
    /// A queue has exactly one owner and that owner closes it once.
    #[error("queue was already closed by its owner")]
    AlreadyClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_queue_error_returns_value() {
        let err = ClosedQueueError(vec![1, 2, 3]);
        assert_eq!(err.to_string(), "enqueue attempted on a closed queue");
        assert_eq!(err.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn closed_queue_error_debug_hides_payload() {
        struct Opaque;
        let err = ClosedQueueError(Opaque);
        assert_eq!(format!("{:?}", err), "ClosedQueueError { .. }");
    }
}
