// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod queue;
mod stage_factory;

pub use config::{ConfigError, ValidationError};
pub use execution::{EngineError, ProcessingError, RequestError};
pub use queue::{ClosedQueueError, QueueError};
pub use stage_factory::StageFactoryError;
