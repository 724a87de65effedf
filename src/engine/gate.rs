// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deadline and cancellation gates around blocking waits.
//!
//! Each gate races a wait against a timer or a cancellation token; whichever
//! resolves first decides the outcome and the loser is dropped. Because
//! [`Queue::dequeue`] is cancel-safe, a value that arrives after the deadline
//! is never lost: it stays queued for the next receiver.
//!
//! A timeout is an outcome, not a failure. It is logged at `debug!` and the
//! caller decides whether to retry.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::engine::Queue;
use crate::observability::messages::engine::ReceiveTimedOut;
use crate::observability::messages::StructuredLog;

/// Outcome of a gated receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receive<T> {
    /// A value arrived in time.
    Completed(T),
    /// The queue is closed and drained; no value will ever arrive.
    Closed,
    /// The deadline passed first.
    TimedOut,
    /// The cancellation token fired first.
    Cancelled,
}

impl<T> Receive<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Receive::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Receive::TimedOut)
    }
}

/// Outcome of [`with_deadline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate<T> {
    Completed(T),
    TimedOut,
}

/// Receive the next value from `queue`, giving up after `timeout`.
///
/// ```
/// use std::time::Duration;
/// use the_conduit::engine::{receive_with_timeout, Queue, Receive};
///
/// # #[tokio::main]
/// # async fn main() {
/// let queue: Queue<u8> = Queue::new(1);
/// let outcome = receive_with_timeout(&queue, Duration::from_millis(10)).await;
/// assert_eq!(outcome, Receive::TimedOut);
/// # }
/// ```
pub async fn receive_with_timeout<T>(queue: &Queue<T>, timeout: Duration) -> Receive<T> {
    match tokio::time::timeout(timeout, queue.dequeue()).await {
        Ok(Some(value)) => Receive::Completed(value),
        Ok(None) => Receive::Closed,
        Err(_) => {
            ReceiveTimedOut { timeout }.log();
            Receive::TimedOut
        }
    }
}

/// Receive the next value from `queue` unless `token` is cancelled first.
pub async fn receive_or_cancel<T>(queue: &Queue<T>, token: &CancellationToken) -> Receive<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Receive::Cancelled,
        value = queue.dequeue() => match value {
            Some(value) => Receive::Completed(value),
            None => Receive::Closed,
        },
    }
}

/// Receive with both a deadline and a cancellation token in the wait set.
pub async fn receive_within<T>(
    queue: &Queue<T>,
    timeout: Duration,
    token: &CancellationToken,
) -> Receive<T> {
    match tokio::time::timeout(timeout, receive_or_cancel(queue, token)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            ReceiveTimedOut { timeout }.log();
            Receive::TimedOut
        }
    }
}

/// Bound any future by a deadline.
///
/// The future is dropped if the deadline wins, so only wrap futures whose
/// cancellation is harmless.
pub async fn with_deadline<F>(future: F, timeout: Duration) -> Gate<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(output) => Gate::Completed(output),
        Err(_) => Gate::TimedOut,
    }
}
