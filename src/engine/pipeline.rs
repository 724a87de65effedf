// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Linear chain of stages connected by private queues.
//!
//! Stage *k* reads the queue stage *k - 1* writes, so the whole chain is
//! visible to callers only as one input queue and one output queue. Every
//! stage runs its own task and owns its output queue: it closes that queue
//! once its input has been closed and drained, so closing the head input
//! ripples down the chain in order.
//!
//! ```text
//! input ──> [square] ──q1──> [greater_than] ──> output
//! ```
//!
//! Each stage moves through `Running -> Draining -> Closed` and never skips
//! `Draining`. Stage chains must be acyclic; feeding the output back into the
//! input hangs the chain.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use the_conduit::engine::Pipeline;
//! use the_conduit::stages::{FilterStage, MapStage};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pipeline = Pipeline::builder()
//!     .stage(MapStage::new("square", |x: i64| x * x))
//!     .stage(FilterStage::new("big", |x: &i64| *x > 20))
//!     .capacity(4)
//!     .spawn();
//!
//! let input = pipeline.input();
//! tokio::spawn(async move {
//!     for n in 1..=10 {
//!         input.enqueue(n).await.unwrap();
//!     }
//!     input.close().unwrap();
//! });
//!
//! assert_eq!(pipeline.output().collect().await, vec![25, 36, 49, 64, 81, 100]);
//! # }
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::queue::{take_with_slot, Handoff};
use crate::engine::Queue;
use crate::observability::messages::engine::{
    EnqueueRejected, QueueClosedElsewhere, StageStateChanged, TaskEndedAbnormally,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Stage;

/// Lifecycle of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Input still open.
    Running,
    /// Input closed; forwarding what is left.
    Draining,
    /// Output closed and the stage task has finished its loop.
    Closed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::Running => "running",
            StageState::Draining => "draining",
            StageState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Per-stage counters reported by [`PipelineHandle::join`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub id: String,
    pub state: StageState,
    pub received: u64,
    pub forwarded: u64,
}

struct StageMonitor {
    id: String,
    state: Mutex<StageState>,
    received: AtomicU64,
    forwarded: AtomicU64,
}

impl StageMonitor {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Mutex::new(StageState::Running),
            received: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
        }
    }

    fn state(&self) -> StageState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move forward to `to`; moving backwards or staying put is a no-op.
    fn advance(&self, to: StageState) {
        let from = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state >= to {
                return;
            }
            std::mem::replace(&mut *state, to)
        };
        StageStateChanged {
            stage_id: &self.id,
            from: &from.to_string(),
            to: &to.to_string(),
        }
        .log();
    }

    fn summary(&self) -> StageSummary {
        StageSummary {
            id: self.id.clone(),
            state: self.state(),
            received: self.received.load(Ordering::Acquire),
            forwarded: self.forwarded.load(Ordering::Acquire),
        }
    }
}

/// Closes a stage's output and finishes its state machine on every exit
/// path, including a panic inside the stage.
struct StageExit<T> {
    output: Queue<T>,
    monitor: Arc<StageMonitor>,
}

impl<T> Drop for StageExit<T> {
    fn drop(&mut self) {
        self.monitor.advance(StageState::Draining);
        if self.output.close().is_err() {
            QueueClosedElsewhere {
                owner: &self.monitor.id,
            }
            .log();
        }
        self.monitor.advance(StageState::Closed);
    }
}

/// Entry points for building a stage chain.
pub struct Pipeline;

impl Pipeline {
    pub fn builder<T>() -> PipelineBuilder<T>
    where
        T: Send + 'static,
    {
        PipelineBuilder::new()
    }

    /// Spawn `stages` in order, joined by queues of `capacity`.
    ///
    /// An empty chain passes the input straight through.
    pub fn spawn<T>(stages: Vec<Arc<dyn Stage<T>>>, capacity: usize) -> PipelineHandle<T>
    where
        T: Send + 'static,
    {
        PipelineBuilder {
            stages,
            capacity,
            cancellation: CancellationToken::new(),
        }
        .spawn()
    }
}

/// Collects stages and options for a [`PipelineHandle`].
pub struct PipelineBuilder<T> {
    stages: Vec<Arc<dyn Stage<T>>>,
    capacity: usize,
    cancellation: CancellationToken,
}

impl<T> PipelineBuilder<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            capacity: crate::config::consts::DEFAULT_QUEUE_CAPACITY,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<T> + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stages<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Stage<T>>>,
    {
        self.stages.extend(stages);
        self
    }

    /// Capacity of the input queue and of every queue behind it.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Stop every stage when `token` is cancelled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Spawn the chain behind a new input queue.
    pub fn spawn(self) -> PipelineHandle<T> {
        let input = Queue::new(self.capacity);
        self.spawn_from(input)
    }

    /// Spawn the chain reading from an existing queue.
    pub fn spawn_from(self, input: Queue<T>) -> PipelineHandle<T> {
        let mut monitors = Vec::with_capacity(self.stages.len());
        let mut tasks = Vec::with_capacity(self.stages.len());
        let mut upstream = input.clone();

        for stage in self.stages {
            let output = Queue::new(self.capacity);
            let monitor = Arc::new(StageMonitor::new(stage.id()));
            let exit = StageExit {
                output: output.clone(),
                monitor: Arc::clone(&monitor),
            };
            tasks.push(tokio::spawn(run_stage(
                stage,
                upstream,
                self.cancellation.clone(),
                exit,
            )));
            monitors.push(monitor);
            upstream = output;
        }

        PipelineHandle {
            input,
            output: upstream,
            monitors,
            tasks,
            cancellation: self.cancellation,
        }
    }
}

impl<T> Default for PipelineBuilder<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A running stage chain.
pub struct PipelineHandle<T> {
    input: Queue<T>,
    output: Queue<T>,
    monitors: Vec<Arc<StageMonitor>>,
    tasks: Vec<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl<T> PipelineHandle<T> {
    /// The head queue. The caller owns it and must close it.
    pub fn input(&self) -> Queue<T> {
        self.input.clone()
    }

    /// The tail queue, closed by the last stage.
    pub fn output(&self) -> Queue<T> {
        self.output.clone()
    }

    pub fn stage_states(&self) -> Vec<(String, StageState)> {
        self.monitors
            .iter()
            .map(|monitor| (monitor.id.clone(), monitor.state()))
            .collect()
    }

    /// Stop every stage after the value it is handling.
    ///
    /// A stage holds a slot in its output before it takes a value, so the
    /// value in hand is always forwarded and everything else stays queued.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Wait for every stage task to finish.
    pub async fn join(self) -> Vec<StageSummary> {
        for (task, monitor) in self.tasks.into_iter().zip(&self.monitors) {
            if let Err(error) = task.await {
                TaskEndedAbnormally {
                    task: &format!("stage '{}'", monitor.id),
                    error: &error,
                }
                .log();
            }
        }
        self.monitors.iter().map(|monitor| monitor.summary()).collect()
    }
}

async fn run_stage<T>(
    stage: Arc<dyn Stage<T>>,
    input: Queue<T>,
    cancellation: CancellationToken,
    exit: StageExit<T>,
) where
    T: Send + 'static,
{
    loop {
        let (value, permit) = match take_with_slot(&input, &exit.output, &cancellation).await {
            Handoff::Ready(value, permit) => (value, permit),
            Handoff::Drained | Handoff::Cancelled => break,
            Handoff::OutputClosed => {
                EnqueueRejected { owner: stage.id() }.log();
                break;
            }
        };
        exit.monitor.received.fetch_add(1, Ordering::AcqRel);
        if input.is_closed() {
            exit.monitor.advance(StageState::Draining);
        }

        // A filtered value gives its slot back when `permit` drops.
        let Some(value) = stage.apply(value).await else {
            continue;
        };

        if permit.send(value).is_err() {
            EnqueueRejected { owner: stage.id() }.log();
            break;
        }
        exit.monitor.forwarded.fetch_add(1, Ordering::AcqRel);
    }
    // Dropping `exit` closes the output.
}
