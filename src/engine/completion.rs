// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Race-free "wait for N producers, then close" coordination.
//!
//! A [`CompletionCounter`] starts at the number of producers that share an
//! output queue. Each producer releases one slot when it finishes, usually by
//! dropping a [`CompletionGuard`] so that a producer which dies early still
//! releases its slot. [`close_when_complete`] runs the single coordinator
//! task that waits for the counter to reach zero and then closes the shared
//! queue exactly once, whatever order the producers finish in.
//!
//! ```text
//! producer 0 ──┐
//! producer 1 ──┼──> shared queue ──> consumer
//! producer 2 ──┘         ▲
//!      │ guard drop      │ close() once
//!      └──> counter ──> coordinator
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::engine::Queue;
use crate::errors::{EngineError, QueueError};
use crate::observability::messages::engine::{
    CompletionSlotMissing, QueueClosedByOwner, QueueClosedElsewhere,
};
use crate::observability::messages::StructuredLog;

/// Countdown of in-flight producers.
///
/// Never goes below zero, and reaches zero exactly once: the decrement that
/// performs the 1 → 0 transition wakes every waiter, and no later call can
/// re-arm the counter.
#[derive(Debug)]
pub struct CompletionCounter {
    pending: AtomicUsize,
    zero: Notify,
}

impl CompletionCounter {
    pub fn new(pending: usize) -> Self {
        Self {
            pending: AtomicUsize::new(pending),
            zero: Notify::new(),
        }
    }

    /// Register `n` more producers.
    ///
    /// Fails once the counter has already reached zero; waiters were released
    /// at that point and cannot be recalled.
    pub fn add(&self, n: usize) -> Result<(), EngineError> {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                if pending == 0 {
                    None
                } else {
                    Some(pending + n)
                }
            })
            .map(|_| ())
            .map_err(|_| EngineError::CounterReleased)
    }

    /// Release one slot. Returns `true` for the call that reached zero.
    pub fn done(&self) -> Result<bool, EngineError> {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                pending.checked_sub(1)
            })
            .map_err(|_| EngineError::CounterUnderflow)?;

        if previous == 1 {
            self.zero.notify_waiters();
            return Ok(true);
        }
        Ok(false)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until every slot has been released.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking so a concurrent zero
            // transition cannot slip between the check and the await.
            let notified = self.zero.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Releases one slot of a [`CompletionCounter`] when dropped.
///
/// Create exactly one guard per slot the counter was created with.
#[derive(Debug)]
pub struct CompletionGuard {
    counter: Arc<CompletionCounter>,
}

impl CompletionGuard {
    pub fn new(counter: Arc<CompletionCounter>) -> Self {
        Self { counter }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(error) = self.counter.done() {
            CompletionSlotMissing { error: &error }.log();
        }
    }
}

/// Spawn the coordinator that closes `queue` once `counter` reaches zero.
///
/// `owner` names the component that owns `queue`, for logs.
pub fn close_when_complete<T>(
    counter: Arc<CompletionCounter>,
    queue: Queue<T>,
    owner: &'static str,
) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        counter.wait().await;
        match queue.close() {
            Ok(()) => QueueClosedByOwner {
                owner,
                buffered: queue.len(),
            }
            .log(),
            Err(QueueError::AlreadyClosed) => QueueClosedElsewhere { owner }.log(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_wait_returns_immediately_at_zero() {
        let counter = CompletionCounter::new(0);
        timeout(Duration::from_millis(100), counter.wait())
            .await
            .expect("a counter created at zero is already complete");
    }

    #[tokio::test]
    async fn test_wait_releases_after_last_done() {
        let counter = Arc::new(CompletionCounter::new(3));

        let waiter = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.wait().await })
        };

        assert_eq!(counter.done(), Ok(false));
        assert_eq!(counter.done(), Ok(false));
        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert_eq!(counter.done(), Ok(true));
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_goes_negative() {
        let counter = CompletionCounter::new(1);
        assert_eq!(counter.done(), Ok(true));
        assert_eq!(counter.done(), Err(EngineError::CounterUnderflow));
        assert_eq!(counter.pending(), 0);
    }

    #[tokio::test]
    async fn test_cannot_rearm_after_release() {
        let counter = CompletionCounter::new(1);
        counter.add(2).unwrap();
        assert_eq!(counter.pending(), 3);

        for _ in 0..3 {
            counter.done().unwrap();
        }
        assert_eq!(counter.add(1), Err(EngineError::CounterReleased));
    }

    #[tokio::test]
    async fn test_exactly_one_zero_transition_under_contention() {
        let counter = Arc::new(CompletionCounter::new(100));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { counter.done().unwrap() })
            })
            .collect();

        let mut transitions = 0;
        for handle in handles {
            if handle.await.unwrap() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
    }

    #[tokio::test]
    async fn test_guard_releases_even_when_task_panics() {
        let counter = Arc::new(CompletionCounter::new(1));
        let guard = CompletionGuard::new(Arc::clone(&counter));

        let crashed = tokio::spawn(async move {
            let _guard = guard;
            panic!("producer died");
        })
        .await;

        assert!(crashed.unwrap_err().is_panic());
        assert_eq!(counter.pending(), 0);
    }

    #[tokio::test]
    async fn test_close_when_complete_waits_for_every_guard() {
        let counter = Arc::new(CompletionCounter::new(2));
        let queue: Queue<u32> = Queue::new(4);
        let coordinator = close_when_complete(Arc::clone(&counter), queue.clone(), "test");

        let first = CompletionGuard::new(Arc::clone(&counter));
        let second = CompletionGuard::new(Arc::clone(&counter));

        queue.enqueue(1).await.unwrap();
        drop(first);
        sleep(Duration::from_millis(20)).await;
        assert!(!queue.is_closed());

        queue.enqueue(2).await.unwrap();
        drop(second);
        coordinator.await.unwrap();

        assert!(queue.is_closed());
        assert_eq!(queue.collect().await, vec![1, 2]);
    }
}
