// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the same event with structured fields at the level
//! documented on the type.
//!
//! # Organization
//!
//! * `engine` - queue, worker pool, stage and dispatcher lifecycle events
//! * `task` - per-task processing outcomes
//! * `validation` - configuration validation errors
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_conduit::observability::messages::engine::RunStarted;
//! use the_conduit::observability::messages::StructuredLog;
//!
//! let msg = RunStarted {
//!     strategy: "pipeline",
//!     input_count: 10,
//!     workers: 4,
//! };
//!
//! msg.log();
//! ```

use std::fmt::Display;
use tracing::Span;

pub mod engine;
pub mod task;
pub mod validation;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog: Display {
    /// Emit the event at the message's level with its structured fields.
    fn log(&self);

    /// Build a span carrying the message's fields, for work that follows it.
    fn span(&self, name: &str) -> Span;
}
