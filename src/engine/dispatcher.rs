// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Request/response front end for a worker pool.
//!
//! [`RequestDispatcher::call`] submits one task and waits for the matching
//! result. A router task drains the pool's result queue and hands each result
//! to the caller waiting on that [`TaskId`].
//!
//! Unlike [`receive_with_timeout`](crate::engine::receive_with_timeout), a
//! result that arrives after its caller gave up has nowhere to go: the router
//! discards it and logs the fact.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::engine::{PoolSummary, Queue, Task, TaskId, TaskResult, WorkerPool};
use crate::errors::{EngineError, QueueError, RequestError};
use crate::observability::messages::engine::{LateResultDiscarded, TaskEndedAbnormally};
use crate::observability::messages::StructuredLog;
use crate::traits::TaskHandler;

type Waiters<O> = Arc<Mutex<HashMap<TaskId, oneshot::Sender<TaskResult<O>>>>>;

/// A worker pool that answers individual requests.
///
/// ```
/// use std::time::Duration;
/// use the_conduit::engine::RequestDispatcher;
/// use the_conduit::errors::ProcessingError;
/// use the_conduit::traits::handler_fn;
///
/// # #[tokio::main]
/// # async fn main() {
/// let dispatcher = RequestDispatcher::spawn(
///     2,
///     8,
///     handler_fn(|name: String| async move { Ok::<_, ProcessingError>(name.len()) }),
/// )
/// .unwrap();
///
/// let result = dispatcher
///     .call("conduit".to_string(), Duration::from_secs(1))
///     .await
///     .unwrap();
/// assert_eq!(result.output(), Some(&7));
///
/// dispatcher.shutdown().await;
/// # }
/// ```
pub struct RequestDispatcher<I, O> {
    tasks: Queue<Task<I>>,
    waiters: Waiters<O>,
    next_id: AtomicU64,
    pool: WorkerPool,
    router: JoinHandle<()>,
}

impl<I, O> RequestDispatcher<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Start `worker_count` workers behind queues of `capacity`.
    pub fn spawn<H>(worker_count: usize, capacity: usize, handler: H) -> Result<Self, EngineError>
    where
        H: TaskHandler<I, O> + 'static,
    {
        let tasks = Queue::new(capacity);
        let results = Queue::new(capacity);
        let pool = WorkerPool::spawn(worker_count, tasks.clone(), results.clone(), handler)?;

        let waiters: Waiters<O> = Arc::new(Mutex::new(HashMap::new()));
        let router = tokio::spawn(route(results, Arc::clone(&waiters)));

        Ok(Self {
            tasks,
            waiters,
            next_id: AtomicU64::new(0),
            pool,
            router,
        })
    }

    /// Submit `payload` and wait up to `timeout` for its result.
    ///
    /// The deadline covers both waiting for room in the task queue and
    /// waiting for the result.
    pub async fn call(&self, payload: I, timeout: Duration) -> Result<TaskResult<O>, RequestError> {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = oneshot::channel();
        lock(&self.waiters).insert(id, sender);

        let exchange = async {
            self.tasks
                .enqueue(Task { id, payload })
                .await
                .map_err(|_| RequestError::Submit)?;
            receiver.await.map_err(|_| RequestError::Dropped)
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                lock(&self.waiters).remove(&id);
                Err(e)
            }
            Err(_) => {
                lock(&self.waiters).remove(&id);
                Err(RequestError::TimedOut(timeout))
            }
        }
    }

    /// Requests waiting for a result right now.
    pub fn in_flight(&self) -> usize {
        lock(&self.waiters).len()
    }

    /// Stop accepting requests. Requests already submitted still complete.
    ///
    /// Calling it again is allowed; [`shutdown`](Self::shutdown) calls it too.
    pub fn close(&self) {
        match self.tasks.close() {
            Ok(()) => {}
            Err(QueueError::AlreadyClosed) => {
                tracing::debug!("request dispatcher was already closed");
            }
        }
    }

    /// Close, let the pool drain, and stop the router.
    pub async fn shutdown(self) -> PoolSummary {
        self.close();
        let summary = self.pool.join().await;
        if let Err(error) = self.router.await {
            TaskEndedAbnormally {
                task: "result router",
                error: &error,
            }
            .log();
        }
        summary
    }
}

fn lock<O>(waiters: &Waiters<O>) -> MutexGuard<'_, HashMap<TaskId, oneshot::Sender<TaskResult<O>>>> {
    waiters.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn route<O>(results: Queue<TaskResult<O>>, waiters: Waiters<O>)
where
    O: Send + 'static,
{
    while let Some(result) = results.dequeue().await {
        let task_id = result.task_id;
        let waiter = lock(&waiters).remove(&task_id);
        let delivered = match waiter {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        };
        if !delivered {
            LateResultDiscarded { task_id: task_id.0 }.log();
        }
    }

    // The pool is gone; anyone still waiting gets `Dropped`.
    lock(&waiters).clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProcessingError;
    use crate::traits::handler_fn;
    use tokio::time::sleep;

    fn sleepy() -> impl TaskHandler<u64, u64> {
        handler_fn(|millis: u64| async move {
            sleep(Duration::from_millis(millis)).await;
            Ok::<_, ProcessingError>(millis)
        })
    }

    #[tokio::test]
    async fn test_concurrent_calls_get_their_own_results() {
        let dispatcher = Arc::new(RequestDispatcher::spawn(4, 4, sleepy()).unwrap());

        let calls: Vec<_> = [40u64, 10, 30, 0, 20]
            .into_iter()
            .map(|millis| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let result = dispatcher.call(millis, Duration::from_secs(2)).await.unwrap();
                    (millis, result)
                })
            })
            .collect();

        for call in calls {
            let (millis, result) = call.await.unwrap();
            assert_eq!(result.output(), Some(&millis));
        }
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_call_discards_late_result() {
        let dispatcher = RequestDispatcher::spawn(1, 2, sleepy()).unwrap();

        let err = dispatcher
            .call(200, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::TimedOut(Duration::from_millis(20)));
        assert_eq!(dispatcher.in_flight(), 0);

        // The late result is dropped; the next caller gets its own value.
        let result = dispatcher.call(5, Duration::from_secs(2)).await.unwrap();
        assert_eq!(result.output(), Some(&5));

        let summary = dispatcher.shutdown().await;
        assert_eq!(summary.processed, 2);
    }

    #[tokio::test]
    async fn test_handler_error_is_returned_in_result() {
        let dispatcher = RequestDispatcher::spawn(
            1,
            1,
            handler_fn(|n: i64| async move {
                if n < 0 {
                    Err(ProcessingError::failed("negative"))
                } else {
                    Ok(n)
                }
            }),
        )
        .unwrap();

        let result = dispatcher.call(-1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(result.error(), Some(&ProcessingError::failed("negative")));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_dispatcher_rejects_calls() {
        let dispatcher = RequestDispatcher::spawn(1, 1, sleepy()).unwrap();
        dispatcher.close();

        let err = dispatcher.call(1, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, RequestError::Submit);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_close_before_shutdown_is_tolerated() {
        let dispatcher = RequestDispatcher::spawn(1, 1, sleepy()).unwrap();
        let result = dispatcher.call(5, Duration::from_secs(1)).await.unwrap();
        assert_eq!(result.output(), Some(&5));

        dispatcher.close();
        dispatcher.close();
        let summary = tokio::time::timeout(Duration::from_secs(1), dispatcher.shutdown())
            .await
            .expect("shutdown after close completes");
        assert_eq!(summary.processed, 1);
    }
}
