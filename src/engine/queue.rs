// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded, closeable, multi-producer/multi-consumer queue.
//!
//! [`Queue`] is the only conduit the engine uses between concurrent tasks. It
//! behaves like a buffered channel with an explicit owner-driven close:
//!
//! * `enqueue` blocks while the queue is full and open (backpressure, never drops);
//! * `enqueue` on a closed queue fails with [`ClosedQueueError`], handing the value back;
//! * `dequeue` yields buffered values in FIFO order, then `None` once closed and drained;
//! * `close` is called exactly once, by the queue's single owner.
//!
//! A capacity of `0` gives a rendezvous hand-off: `enqueue` returns only after a
//! consumer has taken the value.
//!
//! # Examples
//!
//! ```rust
//! use the_conduit::engine::Queue;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queue = Queue::new(3);
//! queue.enqueue(1).await.unwrap();
//! queue.enqueue(2).await.unwrap();
//! queue.close().unwrap();
//!
//! assert_eq!(queue.dequeue().await, Some(1));
//! assert_eq!(queue.dequeue().await, Some(2));
//! assert_eq!(queue.dequeue().await, None);
//! assert!(queue.enqueue(3).await.is_err());
//! # }
//! ```
//!
//! # Cancellation
//!
//! `dequeue` is cancel-safe: a value is removed from the buffer only in the same
//! poll that returns it, so dropping a pending `dequeue` (for example when a
//! timeout wins a race) never loses a value. `enqueue` is cancel-safe until the
//! value is accepted; for a rendezvous queue, dropping the call while it waits
//! for the hand-off leaves the value queued for the next consumer.
//!
//! A loop that moves values from one queue to another must never stop with a
//! value in hand. [`Queue::reserve`] holds a slot in the destination before
//! anything is taken from the source, so the move itself never waits and a
//! cancelled mover leaves every value in one queue or the other.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::errors::{ClosedQueueError, QueueError};

/// Cloneable handle to a shared bounded queue.
///
/// All clones refer to the same buffer. Cloning is how producers and
/// consumers on different tasks get access; no clone has special rights, so
/// callers are responsible for the single-owner close discipline.
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    /// Broadcast on every push, pop and close.
    changed: Notify,
}

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
    /// Total values ever accepted; doubles as the hand-off ticket.
    accepted: u64,
    /// Total values ever handed to a consumer.
    taken: u64,
    /// Slots promised to outstanding [`Permit`]s.
    reserved: usize,
}

impl<T> Queue<T> {
    /// Create an open queue holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity.max(1)),
                    closed: false,
                    accepted: 0,
                    taken: 0,
                    reserved: 0,
                }),
                changed: Notify::new(),
            }),
        }
    }

    /// Create a queue already holding `values` and already closed.
    ///
    /// Handy for feeding a fixed batch into a pool or pipeline.
    pub fn closed_with<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let buffer: VecDeque<T> = values.into_iter().collect();
        let capacity = buffer.len();
        let accepted = buffer.len() as u64;
        Self {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(State {
                    buffer,
                    closed: true,
                    accepted,
                    taken: 0,
                    reserved: 0,
                }),
                changed: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // No user code runs under this lock, so a poisoned lock still holds
        // consistent state.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of values that may sit in the buffer at once.
    fn slots(&self) -> usize {
        self.shared.capacity.max(1)
    }

    /// Add a value, waiting while the queue is full.
    ///
    /// Fails with the value handed back if the queue is closed, including when
    /// it is closed while this call is waiting for space.
    pub async fn enqueue(&self, value: T) -> Result<(), ClosedQueueError<T>> {
        let ticket = loop {
            let notified = self.shared.changed.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(ClosedQueueError(value));
                }
                if state.buffer.len() + state.reserved < self.slots() {
                    state.buffer.push_back(value);
                    state.accepted += 1;
                    break state.accepted;
                }
            }
            notified.await;
        };
        self.shared.changed.notify_waiters();

        if self.shared.capacity > 0 {
            return Ok(());
        }

        // Rendezvous: wait until a consumer has taken our value. A close while
        // waiting leaves the value drainable, so that also counts as delivered.
        loop {
            let notified = self.shared.changed.notified();
            {
                let state = self.lock();
                if state.taken >= ticket || state.closed {
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Take the next value, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and every buffered value has
    /// been taken.
    pub async fn dequeue(&self) -> Option<T> {
        loop {
            let notified = self.shared.changed.notified();
            {
                let mut state = self.lock();
                if let Some(value) = state.buffer.pop_front() {
                    state.taken += 1;
                    drop(state);
                    self.shared.changed.notify_waiters();
                    return Some(value);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Hold one slot for a value that will be supplied later.
    ///
    /// Waits while the queue is full. Fails if the queue is closed, including
    /// when it is closed during the wait.
    pub async fn reserve(&self) -> Result<Permit<'_, T>, ClosedQueueError<()>> {
        loop {
            let notified = self.shared.changed.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(ClosedQueueError(()));
                }
                if state.buffer.len() + state.reserved < self.slots() {
                    state.reserved += 1;
                    return Ok(Permit {
                        queue: self,
                        used: false,
                    });
                }
            }
            notified.await;
        }
    }

    /// Wait until a value is buffered or the queue is closed. Takes nothing.
    pub async fn readable(&self) {
        loop {
            let notified = self.shared.changed.notified();
            {
                let state = self.lock();
                if !state.buffer.is_empty() || state.closed {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Take the next value if one is buffered, without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        let value = {
            let mut state = self.lock();
            let value = state.buffer.pop_front()?;
            state.taken += 1;
            value
        };
        self.shared.changed.notify_waiters();
        Some(value)
    }

    /// Close the queue. Buffered values stay drainable.
    ///
    /// # Preconditions
    ///
    /// Only the queue's single owner (the producer or stage that writes to it)
    /// closes it, and only once. A second call is reported as
    /// [`QueueError::AlreadyClosed`] rather than ignored.
    pub fn close(&self) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(QueueError::AlreadyClosed);
            }
            state.closed = true;
        }
        self.shared.changed.notify_waiters();
        Ok(())
    }

    /// Drain the queue until it reports closed and empty.
    pub async fn collect(&self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.dequeue().await {
            values.push(value);
        }
        values
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of values currently buffered.
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// A slot held in a [`Queue`] by [`Queue::reserve`].
///
/// Dropping the permit unused gives the slot back.
pub struct Permit<'a, T> {
    queue: &'a Queue<T>,
    used: bool,
}

impl<T> Permit<'_, T> {
    /// Place `value` in the held slot. Never waits.
    ///
    /// On a rendezvous queue the value is left for the next consumer without
    /// waiting for the hand-off. Fails only if the queue was closed after the
    /// slot was reserved.
    pub fn send(mut self, value: T) -> Result<(), ClosedQueueError<T>> {
        self.used = true;
        let placed = {
            let mut state = self.queue.lock();
            state.reserved -= 1;
            if state.closed {
                Err(ClosedQueueError(value))
            } else {
                state.buffer.push_back(value);
                state.accepted += 1;
                Ok(())
            }
        };
        self.queue.shared.changed.notify_waiters();
        placed
    }
}

impl<T> Drop for Permit<'_, T> {
    fn drop(&mut self) {
        if self.used {
            return;
        }
        self.queue.lock().reserved -= 1;
        self.queue.shared.changed.notify_waiters();
    }
}

/// Outcome of [`take_with_slot`].
pub(crate) enum Handoff<'a, T, U> {
    /// A value from the input together with a held output slot.
    Ready(T, Permit<'a, U>),
    /// The input is closed and empty.
    Drained,
    Cancelled,
    /// The output was closed by someone other than the mover.
    OutputClosed,
}

/// Wait until `input` has a value and `output` has room, then take the value.
///
/// Nothing leaves `input` before a slot in `output` is held, so returning at
/// any wait point leaves every value queued.
pub(crate) async fn take_with_slot<'a, T, U>(
    input: &Queue<T>,
    output: &'a Queue<U>,
    cancellation: &CancellationToken,
) -> Handoff<'a, T, U> {
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Handoff::Cancelled,
            _ = input.readable() => {}
        }
        if input.is_closed() && input.is_empty() {
            return Handoff::Drained;
        }

        let permit = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Handoff::Cancelled,
            reserved = output.reserve() => match reserved {
                Ok(permit) => permit,
                Err(_) => return Handoff::OutputClosed,
            },
        };

        // Another consumer of `input` may have won the value; wait again.
        if let Some(value) = input.try_dequeue() {
            return Handoff::Ready(value, permit);
        }
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Queue")
            .field("capacity", &self.shared.capacity)
            .field("len", &state.buffer.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_fifo_single_producer_single_consumer() {
        let queue = Queue::new(4);
        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    queue.enqueue(i).await.unwrap();
                }
                queue.close().unwrap();
            })
        };

        let received = queue.collect().await;
        producer.await.unwrap();

        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_enqueue_after_close_returns_value() {
        let queue = Queue::new(2);
        queue.close().unwrap();

        let err = queue.enqueue("late").await.unwrap_err();
        assert_eq!(err.into_inner(), "late");
    }

    #[tokio::test]
    async fn test_close_twice_is_reported() {
        let queue: Queue<u8> = Queue::new(1);
        assert_eq!(queue.close(), Ok(()));
        assert_eq!(queue.close(), Err(QueueError::AlreadyClosed));
    }

    #[tokio::test]
    async fn test_buffered_values_drain_after_close() {
        let queue = Queue::new(3);
        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();
        queue.close().unwrap();

        assert!(queue.is_closed());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().await, Some(1));
        assert_eq!(queue.dequeue().await, Some(2));
        assert_eq!(queue.dequeue().await, None);
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_len_and_capacity() {
        let queue = Queue::new(3);
        assert_eq!(queue.capacity(), 3);
        assert!(queue.is_empty());

        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();
        queue.enqueue(3).await.unwrap();
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_blocks_when_full() {
        let queue = Queue::new(1);
        queue.enqueue(1).await.unwrap();

        let blocked = timeout(Duration::from_millis(50), queue.enqueue(2)).await;
        assert!(blocked.is_err(), "enqueue on a full queue must wait");
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.dequeue().await, Some(1));
        queue.enqueue(3).await.unwrap();
        assert_eq!(queue.dequeue().await, Some(3));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_producer() {
        let queue = Queue::new(1);
        queue.enqueue(1).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(2).await })
        };
        sleep(Duration::from_millis(20)).await;
        queue.close().unwrap();

        let result = producer.await.unwrap();
        assert_eq!(result.unwrap_err().into_inner(), 2);
        assert_eq!(queue.collect().await, vec![1]);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let queue: Queue<i32> = Queue::new(1);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        sleep(Duration::from_millis(20)).await;
        queue.close().unwrap();

        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rendezvous_waits_for_consumer() {
        let queue = Queue::new(0);

        let unmatched = timeout(Duration::from_millis(50), queue.enqueue(7)).await;
        assert!(unmatched.is_err(), "rendezvous enqueue must wait for a consumer");
        // The abandoned hand-off leaves the value queued.
        assert_eq!(queue.dequeue().await, Some(7));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(30)).await;
                queue.dequeue().await
            })
        };
        timeout(Duration::from_secs(2), queue.enqueue(8))
            .await
            .expect("hand-off should complete once the consumer arrives")
            .unwrap();
        assert_eq!(consumer.await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_backpressure_never_loses_values() {
        let queue = Queue::new(1);
        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    queue.enqueue(i).await.unwrap();
                }
                queue.close().unwrap();
            })
        };

        let mut received = Vec::new();
        while let Some(value) = queue.dequeue().await {
            assert!(queue.len() <= 1);
            received.push(value);
            sleep(Duration::from_millis(2)).await;
        }
        producer.await.unwrap();

        assert_eq!(received, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_multiple_consumers_share_without_duplication() {
        let queue = Queue::new(8);
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.collect().await })
            })
            .collect();

        for i in 0..1000 {
            queue.enqueue(i).await.unwrap();
        }
        queue.close().unwrap();

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        assert_eq!(all.len(), 1000);
        let unique: HashSet<_> = all.into_iter().collect();
        assert_eq!(unique.len(), 1000);
    }

    #[tokio::test]
    async fn test_closed_with_prefills_and_closes() {
        let queue = Queue::closed_with(vec!['a', 'b']);
        assert!(queue.is_closed());
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.collect().await, vec!['a', 'b']);
    }

    #[tokio::test]
    async fn test_try_dequeue_does_not_wait() {
        let queue = Queue::new(2);
        assert_eq!(queue.try_dequeue(), None);

        queue.enqueue(7).await.unwrap();
        assert_eq!(queue.try_dequeue(), Some(7));
        assert_eq!(queue.try_dequeue(), None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_reserved_slot_blocks_enqueue_until_released() {
        let queue = Queue::new(1);
        let permit = queue.reserve().await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(2).await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        drop(permit);
        producer.await.unwrap().unwrap();
        assert_eq!(queue.try_dequeue(), Some(2));
    }

    #[tokio::test]
    async fn test_permit_send_places_value_without_waiting() {
        let queue = Queue::new(2);
        queue.enqueue(1).await.unwrap();
        let permit = queue.reserve().await.unwrap();
        permit.send(2).unwrap();
        queue.close().unwrap();

        assert_eq!(queue.collect().await, vec![1, 2]);
        assert!(queue.reserve().await.is_err());
    }

    #[tokio::test]
    async fn test_readable_waits_for_value_or_close() {
        let queue: Queue<u8> = Queue::new(1);
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.readable().await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.enqueue(5).await.unwrap();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("readable once a value is buffered")
            .unwrap();
        assert_eq!(queue.len(), 1, "readable takes nothing");
    }

    #[tokio::test]
    async fn test_cancelled_handoff_leaves_values_in_place() {
        let input = Queue::closed_with(vec![1, 2, 3]);
        let output = Queue::new(1);
        let token = CancellationToken::new();

        match take_with_slot(&input, &output, &token).await {
            Handoff::Ready(value, permit) => permit.send(value).unwrap(),
            _ => panic!("expected a value and a slot"),
        }

        // Output is full now; the second move waits for room until cancelled.
        let stopper = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });
        assert!(matches!(
            take_with_slot(&input, &output, &token).await,
            Handoff::Cancelled
        ));
        assert_eq!(input.len() + output.len(), 3);
    }
}
