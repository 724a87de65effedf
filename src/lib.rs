// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;        // config loading, validation, runtime
pub mod engine;        // queues, pools, fan-out/in, pipelines
pub mod errors;        // error handling
pub mod observability;
pub mod stages;        // built-in stages
pub mod traits;        // handler and stage abstractions
