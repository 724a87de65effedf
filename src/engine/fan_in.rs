// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Merge of N queues into one.
//!
//! One forwarder task per input moves values to the shared output; each
//! forwarder holds a [`CompletionGuard`] and the output is closed by
//! [`close_when_complete`] once every forwarder has finished. Order is kept
//! per input only; values from different inputs interleave freely.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::completion::{close_when_complete, CompletionCounter, CompletionGuard};
use crate::engine::queue::{take_with_slot, Handoff};
use crate::engine::Queue;
use crate::observability::messages::engine::{EnqueueRejected, MergeCompleted};
use crate::observability::messages::StructuredLog;

const FAN_IN_OWNER: &str = "fan-in";

/// Merge `inputs` into one queue of `capacity`.
///
/// No inputs yields a queue that is already closed. A single input is
/// returned as is, without a forwarding hop.
///
/// ```
/// use the_conduit::engine::{fan_in, Queue};
///
/// # #[tokio::main]
/// # async fn main() {
/// let merged = fan_in(vec![Queue::closed_with(1..=3), Queue::closed_with(10..=11)], 2);
///
/// let mut values = merged.collect().await;
/// values.sort();
/// assert_eq!(values, vec![1, 2, 3, 10, 11]);
/// # }
/// ```
pub fn fan_in<T>(inputs: Vec<Queue<T>>, capacity: usize) -> Queue<T>
where
    T: Send + 'static,
{
    fan_in_until(inputs, capacity, CancellationToken::new())
}

/// [`fan_in`] whose forwarders also stop when `cancellation` fires.
///
/// The output is still closed exactly once, after the last forwarder stops.
/// A forwarder takes a value only once the output has room for it, so values
/// not yet merged stay in their input.
pub fn fan_in_until<T>(
    mut inputs: Vec<Queue<T>>,
    capacity: usize,
    cancellation: CancellationToken,
) -> Queue<T>
where
    T: Send + 'static,
{
    if inputs.is_empty() {
        let output = Queue::new(capacity);
        // A fresh queue cannot already be closed.
        let _ = output.close();
        return output;
    }
    if inputs.len() == 1 {
        return inputs.remove(0);
    }

    let merged = inputs.len();
    let output = Queue::new(capacity);
    let counter = Arc::new(CompletionCounter::new(merged));

    for input in inputs {
        let guard = CompletionGuard::new(Arc::clone(&counter));
        tokio::spawn(forward(input, output.clone(), cancellation.clone(), guard));
    }

    let coordinator = close_when_complete(counter, output.clone(), FAN_IN_OWNER);
    tokio::spawn(async move {
        if coordinator.await.is_ok() {
            MergeCompleted { inputs: merged }.log();
        }
    });

    output
}

async fn forward<T>(
    input: Queue<T>,
    output: Queue<T>,
    cancellation: CancellationToken,
    _guard: CompletionGuard,
) where
    T: Send + 'static,
{
    loop {
        let (value, permit) = match take_with_slot(&input, &output, &cancellation).await {
            Handoff::Ready(value, permit) => (value, permit),
            Handoff::Drained | Handoff::Cancelled => return,
            Handoff::OutputClosed => {
                EnqueueRejected {
                    owner: FAN_IN_OWNER,
                }
                .log();
                return;
            }
        };
        if permit.send(value).is_err() {
            EnqueueRejected {
                owner: FAN_IN_OWNER,
            }
            .log();
            return;
        }
    }
}
