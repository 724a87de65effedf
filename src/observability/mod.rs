// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout the engine. Message types follow a struct-based pattern
//! with `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between log lines and spans
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - queue, worker pool, stage and dispatcher lifecycle events
//! * `messages::task` - per-task processing outcomes
//! * `messages::validation` - configuration validation errors
//!
//! # Usage
//!
//! ```rust
//! use the_conduit::observability::messages::task::TaskProcessingFailed;
//! use the_conduit::errors::ProcessingError;
//!
//! let error = ProcessingError::failed("bad input");
//! let msg = TaskProcessingFailed {
//!     task_id: 7,
//!     worker_id: 2,
//!     error: &error,
//! };
//!
//! tracing::warn!("{}", msg);
//! ```

pub mod messages;
