// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{validate_config, Config, Strategy};
use crate::engine::{
    fan_in_until, receive_within, spawn_fan_out, spawn_source_until, Pipeline, PipelineHandle,
    PoolSummary, Queue, Receive, StageSummary, Task, TaskId, TaskResult, WorkerId, WorkerPool,
};
use crate::errors::{ConfigError, EngineError, ProcessingError, ValidationError};
use crate::observability::messages::engine::{RunCompleted, RunStarted, TaskEndedAbnormally};
use crate::observability::messages::StructuredLog;
use crate::stages::{IntStage, LocalStageFactory};
use crate::traits::TaskHandler;

/// Runtime builder - turns a validated configuration into an [`EngineRuntime`].
///
/// # Examples
///
/// ```
/// use the_conduit::config::{Config, RuntimeBuilder, StageConfig, Strategy};
/// use std::collections::HashMap;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut config = Config::new(Strategy::Pipeline);
/// config.stages.push(StageConfig {
///     id: "square".to_string(),
///     op: "square".to_string(),
///     options: HashMap::new(),
/// });
///
/// let runtime = RuntimeBuilder::from_config(&config).unwrap();
/// let report = runtime.run(vec![1, 2, 3]).await.unwrap();
/// assert_eq!(report.outputs, vec![1, 4, 9]);
/// # }
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Validate `cfg` and build its stages.
    pub fn from_config(cfg: &Config) -> Result<EngineRuntime, ConfigError> {
        validate_config(cfg).map_err(ConfigError::Validation)?;

        let stages = LocalStageFactory::create_chain(&cfg.stages).map_err(|e| {
            ConfigError::Validation(vec![ValidationError::InvalidStage {
                stage_id: e.stage_id().to_string(),
                reason: e.to_string(),
            }])
        })?;

        Ok(EngineRuntime {
            strategy: cfg.strategy,
            queue_capacity: cfg.queue_capacity,
            workers: cfg.workers,
            receive_timeout: cfg.receive_timeout(),
            task_timeout: cfg.task_timeout(),
            stages,
        })
    }
}

/// A processing task that failed, as reported by a `worker_pool` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub error: String,
}

/// Everything a run produced.
///
/// `outputs` keeps input order for `worker_pool` and `pipeline`; for
/// `fan_out_fan_in` only the order within each branch is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub strategy: Strategy,
    pub inputs: usize,
    pub outputs: Vec<i64>,
    pub failures: Vec<TaskFailure>,
    pub stages: Vec<StageSummary>,
    pub pool: Option<PoolSummary>,
    /// The consumer gave up waiting for the next output.
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl RunReport {
    fn new(strategy: Strategy, inputs: usize) -> Self {
        Self {
            strategy,
            inputs,
            outputs: Vec::new(),
            failures: Vec::new(),
            stages: Vec::new(),
            pool: None,
            timed_out: false,
            duration_ms: 0,
        }
    }
}

/// A configured engine, ready to run batches of integers.
pub struct EngineRuntime {
    strategy: Strategy,
    queue_capacity: usize,
    workers: usize,
    receive_timeout: Duration,
    task_timeout: Option<Duration>,
    stages: Vec<IntStage>,
}

impl EngineRuntime {
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub async fn run(&self, inputs: Vec<i64>) -> Result<RunReport, EngineError> {
        self.run_until(inputs, CancellationToken::new()).await
    }

    /// Run `inputs` through the engine until they are consumed, the consumer
    /// times out, or `cancellation` fires.
    pub async fn run_until(
        &self,
        inputs: Vec<i64>,
        cancellation: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let strategy = self.strategy.to_string();
        let run = RunStarted {
            strategy: &strategy,
            input_count: inputs.len(),
            workers: self.workers,
        };
        run.log();
        let span = run.span("run");

        // A timeout cancels this run only, never the caller's token.
        let token = cancellation.child_token();
        let mut report = match self.strategy {
            Strategy::WorkerPool => self.run_worker_pool(inputs, &token).instrument(span).await?,
            Strategy::Pipeline => self.run_pipeline(inputs, &token).instrument(span).await,
            Strategy::FanOutFanIn => self.run_fan_out_fan_in(inputs, &token).instrument(span).await?,
        };
        report.duration_ms = started.elapsed().as_millis() as u64;

        RunCompleted {
            strategy: &strategy,
            output_count: report.outputs.len(),
            failed_count: report.failures.len(),
            timed_out: report.timed_out,
            duration: started.elapsed(),
        }
        .log();
        Ok(report)
    }

    async fn run_worker_pool(
        &self,
        inputs: Vec<i64>,
        token: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let mut report = RunReport::new(self.strategy, inputs.len());
        let (tasks, _producer) =
            spawn_source_until(Task::sequence(inputs), self.queue_capacity, token.clone());
        let results = Queue::new(self.queue_capacity);

        let mut builder = WorkerPool::builder(self.workers).cancellation(token.clone());
        if let Some(limit) = self.task_timeout {
            builder = builder.task_timeout(limit);
        }
        let pool = builder.spawn(
            tasks,
            results.clone(),
            StageChain {
                stages: self.stages.clone(),
            },
        )?;

        let (mut collected, timed_out) = drain(&results, self.receive_timeout, token).await;
        report.timed_out = timed_out;
        if timed_out || token.is_cancelled() {
            // Workers still publish the task in hand, so read until the pool
            // closes the result queue or goes quiet.
            token.cancel();
            let (rest, _) =
                drain(&results, self.receive_timeout, &CancellationToken::new()).await;
            collected.extend(rest);
        }
        report.pool = Some(if results.is_closed() && results.is_empty() {
            pool.join().await
        } else {
            // A hung handler must not hang the run; take the counters as they stand.
            pool.summary()
        });

        collected.sort_by_key(|result: &TaskResult<Option<i64>>| result.task_id);
        for result in collected {
            match result.outcome {
                Ok(Some(value)) => report.outputs.push(value),
                Ok(None) => {}
                Err(error) => report.failures.push(TaskFailure {
                    task_id: result.task_id,
                    worker_id: result.worker_id,
                    error: error.to_string(),
                }),
            }
        }
        Ok(report)
    }

    async fn run_pipeline(&self, inputs: Vec<i64>, token: &CancellationToken) -> RunReport {
        let mut report = RunReport::new(self.strategy, inputs.len());
        let (numbers, _producer) = spawn_source_until(inputs, self.queue_capacity, token.clone());
        let pipeline = self.chain(token).spawn_from(numbers);

        let (outputs, timed_out) = drain(&pipeline.output(), self.receive_timeout, token).await;
        if timed_out {
            token.cancel();
        }
        report.outputs = outputs;
        report.timed_out = timed_out;
        report.stages = pipeline.join().await;
        report
    }

    async fn run_fan_out_fan_in(
        &self,
        inputs: Vec<i64>,
        token: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let mut report = RunReport::new(self.strategy, inputs.len());
        let (numbers, _producer) = spawn_source_until(inputs, self.queue_capacity, token.clone());
        let (branches, dispatcher) =
            spawn_fan_out(numbers, self.workers, self.queue_capacity, token.clone())?;

        let pipelines: Vec<PipelineHandle<i64>> = branches
            .into_iter()
            .map(|branch| self.chain(token).spawn_from(branch))
            .collect();
        let merged = fan_in_until(
            pipelines.iter().map(|pipeline| pipeline.output()).collect(),
            self.queue_capacity,
            token.clone(),
        );

        let (outputs, timed_out) = drain(&merged, self.receive_timeout, token).await;
        if timed_out {
            token.cancel();
        }
        report.outputs = outputs;
        report.timed_out = timed_out;

        for (branch, pipeline) in pipelines.into_iter().enumerate() {
            for mut summary in pipeline.join().await {
                summary.id = format!("{}[{}]", summary.id, branch);
                report.stages.push(summary);
            }
        }
        if let Err(error) = dispatcher.await {
            TaskEndedAbnormally {
                task: "fan-out dispatcher",
                error: &error,
            }
            .log();
        }
        Ok(report)
    }

    fn chain(&self, token: &CancellationToken) -> crate::engine::PipelineBuilder<i64> {
        Pipeline::builder()
            .stages(self.stages.iter().cloned())
            .capacity(self.queue_capacity)
            .cancellation(token.clone())
    }
}

/// Drain `queue` through the timeout gate. The flag is set when the gate
/// timed out before the queue closed.
async fn drain<T>(queue: &Queue<T>, timeout: Duration, token: &CancellationToken) -> (Vec<T>, bool) {
    let mut values = Vec::new();
    loop {
        match receive_within(queue, timeout, token).await {
            Receive::Completed(value) => values.push(value),
            Receive::Closed | Receive::Cancelled => return (values, false),
            Receive::TimedOut => return (values, true),
        }
    }
}

/// The whole stage chain applied to one task, for the `worker_pool` strategy.
///
/// `Ok(None)` means a filter dropped the value.
struct StageChain {
    stages: Vec<IntStage>,
}

#[async_trait]
impl TaskHandler<i64, Option<i64>> for StageChain {
    async fn handle(&self, input: i64) -> Result<Option<i64>, ProcessingError> {
        let mut value = input;
        for stage in &self.stages {
            match stage.apply(value).await {
                Some(next) => value = next,
                None => return Ok(None),
            }
        }
        Ok(Some(value))
    }

    fn name(&self) -> &str {
        "stage_chain"
    }
}
