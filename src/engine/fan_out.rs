// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Round-robin dispatch of one queue across N output queues.
//!
//! Value `i` read from the input goes to output `i mod N`. When the input is
//! closed and drained the dispatcher closes every output, after the last
//! value has been placed, so a consumer of any output sees every value meant
//! for it before it sees the close.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::queue::{take_with_slot, Handoff};
use crate::engine::Queue;
use crate::errors::EngineError;
use crate::observability::messages::engine::{
    DispatchCompleted, EnqueueRejected, QueueClosedElsewhere,
};
use crate::observability::messages::StructuredLog;

const FAN_OUT_OWNER: &str = "fan-out";

/// Split `input` across `n` new queues of `capacity` each.
///
/// ```
/// use the_conduit::engine::{fan_out, Queue};
///
/// # #[tokio::main]
/// # async fn main() {
/// let input = Queue::closed_with(0..6);
/// let outputs = fan_out(input, 2, 4).unwrap();
///
/// assert_eq!(outputs[0].collect().await, vec![0, 2, 4]);
/// assert_eq!(outputs[1].collect().await, vec![1, 3, 5]);
/// # }
/// ```
pub fn fan_out<T>(input: Queue<T>, n: usize, capacity: usize) -> Result<Vec<Queue<T>>, EngineError>
where
    T: Send + 'static,
{
    spawn_fan_out(input, n, capacity, CancellationToken::new()).map(|(outputs, _)| outputs)
}

/// [`fan_out`] with a cancellation token and a handle to the dispatcher.
///
/// The handle resolves to the number of values dispatched. On cancellation
/// the dispatcher stops reading, closes every output and leaves whatever is
/// still in `input` where it is. A value is only taken from `input` once its
/// output has room, so none is lost between the two.
pub fn spawn_fan_out<T>(
    input: Queue<T>,
    n: usize,
    capacity: usize,
    cancellation: CancellationToken,
) -> Result<(Vec<Queue<T>>, JoinHandle<u64>), EngineError>
where
    T: Send + 'static,
{
    if n == 0 {
        return Err(EngineError::InvalidArgument {
            name: "n",
            reason: "fan-out needs at least one output".to_string(),
        });
    }

    let outputs: Vec<Queue<T>> = (0..n).map(|_| Queue::new(capacity)).collect();
    let handle = tokio::spawn(dispatch(input, outputs.clone(), cancellation));
    Ok((outputs, handle))
}

async fn dispatch<T>(input: Queue<T>, outputs: Vec<Queue<T>>, cancellation: CancellationToken) -> u64
where
    T: Send + 'static,
{
    let mut dispatched = 0u64;

    loop {
        let target = &outputs[(dispatched % outputs.len() as u64) as usize];
        let (value, permit) = match take_with_slot(&input, target, &cancellation).await {
            Handoff::Ready(value, permit) => (value, permit),
            Handoff::Drained | Handoff::Cancelled => break,
            Handoff::OutputClosed => {
                EnqueueRejected {
                    owner: FAN_OUT_OWNER,
                }
                .log();
                break;
            }
        };
        if permit.send(value).is_err() {
            EnqueueRejected {
                owner: FAN_OUT_OWNER,
            }
            .log();
            break;
        }
        dispatched += 1;
    }

    for output in &outputs {
        if output.close().is_err() {
            QueueClosedElsewhere {
                owner: FAN_OUT_OWNER,
            }
            .log();
        }
    }

    DispatchCompleted {
        outputs: outputs.len(),
        dispatched,
    }
    .log();
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_round_robin_assignment() {
        let input = Queue::closed_with(0..23u32);
        let outputs = fan_out(input, 4, 2).unwrap();

        // Drain every output at once; a full output stalls the dispatcher.
        let collectors: Vec<_> = outputs
            .into_iter()
            .map(|output| tokio::spawn(async move { output.collect().await }))
            .collect();

        let mut total = 0;
        for (k, collector) in collectors.into_iter().enumerate() {
            let values = timeout(Duration::from_secs(5), collector)
                .await
                .expect("every output closes")
                .unwrap();
            total += values.len();
            let expected: Vec<u32> = (0..23).filter(|i| *i as usize % 4 == k).collect();
            assert_eq!(values, expected, "output {}", k);
        }
        assert_eq!(total, 23);
    }

    #[tokio::test]
    async fn test_outputs_close_after_flush() {
        let input = Queue::new(1);
        let (outputs, handle) =
            spawn_fan_out(input.clone(), 2, 8, CancellationToken::new()).unwrap();

        for value in 0..4 {
            input.enqueue(value).await.unwrap();
        }
        input.close().unwrap();

        assert_eq!(handle.await.unwrap(), 4);
        for output in &outputs {
            assert!(output.is_closed());
            assert_eq!(output.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_single_output_receives_everything_in_order() {
        let outputs = fan_out(Queue::closed_with(["a", "b", "c"]), 1, 1).unwrap();
        assert_eq!(outputs[0].collect().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_cancellation_closes_outputs_and_leaves_input() {
        let input: Queue<u8> = Queue::new(4);
        input.enqueue(1).await.unwrap();
        let token = CancellationToken::new();
        let (outputs, handle) = spawn_fan_out(input.clone(), 3, 4, token.clone()).unwrap();

        sleep(Duration::from_millis(20)).await;
        token.cancel();

        let dispatched = timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher stops on cancel")
            .unwrap();
        assert_eq!(dispatched, 1);
        assert!(outputs.iter().all(|o| o.is_closed()));
        assert!(!input.is_closed());
    }

    #[tokio::test]
    async fn test_cancel_while_output_full_keeps_every_value() {
        let input = Queue::closed_with(0..3u32);
        let token = CancellationToken::new();
        let (outputs, handle) = spawn_fan_out(input.clone(), 1, 1, token.clone()).unwrap();

        sleep(Duration::from_millis(20)).await;
        token.cancel();

        let dispatched = timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher stops on cancel")
            .unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(outputs[0].collect().await, vec![0]);
        assert_eq!(input.collect().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_zero_outputs_rejected() {
        let err = fan_out(Queue::<u8>::new(1), 0, 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { name: "n", .. }));
    }
}
