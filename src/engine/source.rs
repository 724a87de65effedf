// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::Queue;
use crate::observability::messages::engine::{
    EnqueueRejected, QueueClosedByOwner, QueueClosedElsewhere,
};
use crate::observability::messages::StructuredLog;

const SOURCE_OWNER: &str = "source";

/// Feed `values` into a new queue of `capacity` from a spawned producer.
///
/// The producer owns the queue and closes it once the iterator is
/// exhausted. The handle resolves to the number of values produced.
///
/// ```
/// use the_conduit::engine::spawn_source;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (numbers, producer) = spawn_source(1..=5, 2);
/// assert_eq!(numbers.collect().await, vec![1, 2, 3, 4, 5]);
/// assert_eq!(producer.await.unwrap(), 5);
/// # }
/// ```
pub fn spawn_source<I>(values: I, capacity: usize) -> (Queue<I::Item>, JoinHandle<u64>)
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    spawn_source_until(values, capacity, CancellationToken::new())
}

/// [`spawn_source`] that stops producing when `cancellation` fires.
///
/// The queue is closed on cancellation too. Values the iterator has not
/// yielded yet are never pulled.
pub fn spawn_source_until<I>(
    values: I,
    capacity: usize,
    cancellation: CancellationToken,
) -> (Queue<I::Item>, JoinHandle<u64>)
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    let queue = Queue::new(capacity);
    let output = queue.clone();
    let mut values = values.into_iter();

    let handle = tokio::spawn(async move {
        let mut produced = 0u64;
        loop {
            // Hold a slot first so the iterator is never advanced for a value
            // that cannot be placed.
            let permit = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                reserved = output.reserve() => match reserved {
                    Ok(permit) => permit,
                    Err(_) => {
                        EnqueueRejected {
                            owner: SOURCE_OWNER,
                        }
                        .log();
                        return produced;
                    }
                },
            };
            let Some(value) = values.next() else {
                break;
            };
            if permit.send(value).is_err() {
                EnqueueRejected {
                    owner: SOURCE_OWNER,
                }
                .log();
                return produced;
            }
            produced += 1;
        }

        match output.close() {
            Ok(()) => QueueClosedByOwner {
                owner: SOURCE_OWNER,
                buffered: output.len(),
            }
            .log(),
            Err(_) => QueueClosedElsewhere {
                owner: SOURCE_OWNER,
            }
            .log(),
        }
        produced
    });

    (queue, handle)
}
