// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration validation errors.
//!
//! This module contains message types for logging events related to:
//! * Out-of-range numeric settings
//! * Duplicate stage ID detection
//! * Stages the factory could not build

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A numeric configuration value is out of range.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_conduit::observability::messages::validation::InvalidConfigValue;
///
/// let msg = InvalidConfigValue {
///     field: "workers",
///     reason: "must be at least 1",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct InvalidConfigValue<'a> {
    pub field: &'a str,
    pub reason: &'a str,
}

impl Display for InvalidConfigValue<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Invalid value for '{}': {}", self.field, self.reason)
    }
}

impl StructuredLog for InvalidConfigValue<'_> {
    fn log(&self) {
        tracing::error!(field = self.field, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            field = self.field,
        )
    }
}

/// Duplicate stage ID detected in configuration.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DuplicateStageId<'a> {
    pub stage_id: &'a str,
}

impl Display for DuplicateStageId<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Duplicate stage ID: '{}'", self.stage_id)
    }
}

impl StructuredLog for DuplicateStageId<'_> {
    fn log(&self) {
        tracing::error!(stage_id = self.stage_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            stage_id = self.stage_id,
        )
    }
}

/// The stage factory rejected a stage definition.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct StageRejected<'a> {
    pub stage_id: &'a str,
    pub reason: &'a str,
}

impl Display for StageRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}' rejected: {}", self.stage_id, self.reason)
    }
}

impl StructuredLog for StageRejected<'_> {
    fn log(&self) {
        tracing::error!(stage_id = self.stage_id, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            stage_id = self.stage_id,
        )
    }
}
