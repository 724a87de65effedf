// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{
    fan_in, fan_out, receive_with_timeout, spawn_source, Pipeline, Queue, Receive, Task,
    TaskResult, WorkerPool,
};
use crate::errors::ProcessingError;
use crate::stages::{FilterStage, MapStage};
use crate::traits::{handler_fn, Stage};

/// Integration tests composing several engine components
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_source_into_pipeline_into_timed_consumer() {
        let (numbers, producer) = spawn_source(1..=10i64, 2);
        let pipeline = Pipeline::builder()
            .stage(MapStage::new("square", |x: i64| x * x))
            .stage(FilterStage::new("greater_than_20", |x: &i64| *x > 20))
            .capacity(2)
            .spawn_from(numbers);

        let output = pipeline.output();
        let mut received = Vec::new();
        loop {
            match receive_with_timeout(&output, Duration::from_secs(2)).await {
                Receive::Completed(value) => received.push(value),
                Receive::Closed => break,
                other => panic!("unexpected receive outcome {:?}", other),
            }
        }

        assert_eq!(received, vec![25, 36, 49, 64, 81, 100]);
        assert_eq!(producer.await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_fan_out_to_parallel_chains_and_merge() {
        let (numbers, _producer) = spawn_source(1..=100i64, 8);
        let branches = fan_out(numbers, 3, 4).unwrap();

        let outputs: Vec<Queue<i64>> = branches
            .into_iter()
            .map(|branch| {
                Pipeline::builder()
                    .stage(MapStage::new("double", |x: i64| x * 2))
                    .capacity(4)
                    .spawn_from(branch)
                    .output()
            })
            .collect();

        let merged = fan_in(outputs, 4);
        let mut values = timeout(Duration::from_secs(5), merged.collect())
            .await
            .expect("merged stream closes");
        values.sort();

        let expected: Vec<i64> = (1..=100).map(|x| x * 2).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_worker_pools_feeding_fan_in() {
        let mut result_queues = Vec::new();
        let mut pools = Vec::new();

        for batch in 0..3u64 {
            let tasks = Queue::closed_with(
                (0..10u64).map(move |i| Task::new(batch * 100 + i, batch * 100 + i)),
            );
            let results: Queue<TaskResult<u64>> = Queue::new(2);
            let pool = WorkerPool::spawn(
                2,
                tasks,
                results.clone(),
                handler_fn(|n: u64| async move { Ok::<_, ProcessingError>(n + 1) }),
            )
            .unwrap();
            result_queues.push(results);
            pools.push(pool);
        }

        let merged = fan_in(result_queues, 4).collect().await;
        assert_eq!(merged.len(), 30);
        let ids: HashSet<u64> = merged.iter().map(|r| r.task_id.0).collect();
        assert_eq!(ids.len(), 30);
        assert!(merged.iter().all(|r| r.output() == Some(&(r.task_id.0 + 1))));

        for pool in pools {
            assert_eq!(pool.join().await.processed, 10);
        }
    }

    #[tokio::test]
    async fn test_pool_with_failures_and_panics_conserves_tasks() {
        let tasks = Queue::new(4);
        let results = Queue::new(4);
        let handler = handler_fn(|n: i64| async move {
            match n % 5 {
                0 => panic!("multiple of five: {}", n),
                1 => Err(ProcessingError::failed("remainder one")),
                _ => Ok(n),
            }
        });
        let pool = WorkerPool::builder(3)
            .task_timeout(Duration::from_secs(1))
            .spawn(tasks.clone(), results.clone(), handler)
            .unwrap();

        let producer = tokio::spawn(async move {
            for task in Task::sequence(0..50i64) {
                tasks.enqueue(task).await.unwrap();
            }
            tasks.close().unwrap();
        });

        let collected = results.collect().await;
        producer.await.unwrap();
        let summary = pool.join().await;

        assert_eq!(collected.len(), 50);
        let panicked = collected
            .iter()
            .filter(|r| matches!(r.error(), Some(ProcessingError::Panicked { .. })))
            .count();
        let failed = collected
            .iter()
            .filter(|r| matches!(r.error(), Some(ProcessingError::Failed { .. })))
            .count();
        assert_eq!(panicked, 10);
        assert_eq!(failed, 10);
        assert_eq!(summary.failed, 20);
    }

    #[tokio::test]
    async fn test_slow_consumer_times_out_then_recovers_value() {
        let pipeline = Pipeline::builder()
            .stage(MapStage::new("increment", |x: i64| x + 1))
            .capacity(1)
            .spawn();
        let input = pipeline.input();
        tokio::spawn(async move {
            sleep(Duration::from_millis(80)).await;
            input.enqueue(41).await.unwrap();
            input.close().unwrap();
        });

        let output = pipeline.output();
        assert_eq!(
            receive_with_timeout(&output, Duration::from_millis(10)).await,
            Receive::TimedOut
        );
        assert_eq!(
            receive_with_timeout(&output, Duration::from_secs(2)).await,
            Receive::Completed(42)
        );
        assert_eq!(
            receive_with_timeout(&output, Duration::from_secs(2)).await,
            Receive::Closed
        );
    }

    #[tokio::test]
    async fn test_closing_head_ripples_through_long_chain() {
        let stages: Vec<Arc<dyn Stage<i64>>> = (0..10)
            .map(|i| Arc::new(MapStage::new(format!("inc_{}", i), |x: i64| x + 1)) as Arc<dyn Stage<i64>>)
            .collect();
        let pipeline = Pipeline::spawn(stages, 1);

        let input = pipeline.input();
        input.enqueue(0).await.unwrap();
        input.close().unwrap();

        assert_eq!(pipeline.output().collect().await, vec![10]);
        let summaries = pipeline.join().await;
        assert_eq!(summaries.len(), 10);
        assert!(summaries.iter().all(|s| s.forwarded == 1));
    }
}
