// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod completion;
pub mod dispatcher;
pub mod fan_in;
pub mod fan_out;
pub mod gate;
pub mod pipeline;
pub mod queue;
pub mod source;
pub mod task;
pub mod worker_pool;
#[cfg(test)]
pub mod integration_tests;

pub use completion::{close_when_complete, CompletionCounter, CompletionGuard};
pub use dispatcher::RequestDispatcher;
pub use fan_in::{fan_in, fan_in_until};
pub use fan_out::{fan_out, spawn_fan_out};
pub use gate::{receive_or_cancel, receive_with_timeout, receive_within, with_deadline, Gate, Receive};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineHandle, StageState, StageSummary};
pub use queue::{Permit, Queue};
pub use source::{spawn_source, spawn_source_until};
pub use task::{Task, TaskId, TaskResult, WorkerId};
pub use worker_pool::{PoolSummary, WorkerPool, WorkerPoolBuilder};
