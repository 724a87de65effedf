// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for building stages from configuration.

use std::error::Error;
use std::fmt;

/// Errors that can occur while creating a built-in stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageFactoryError {
    /// The `op` name does not match any built-in stage
    UnknownOperation { stage_id: String, op: String },

    /// The operation needs an option the stage did not provide
    MissingOption {
        stage_id: String,
        op: String,
        option: &'static str,
    },

    /// An option was present but could not be used
    InvalidOption {
        stage_id: String,
        option: &'static str,
        reason: String,
    },
}

impl StageFactoryError {
    /// The stage whose configuration was rejected
    pub fn stage_id(&self) -> &str {
        match self {
            StageFactoryError::UnknownOperation { stage_id, .. }
            | StageFactoryError::MissingOption { stage_id, .. }
            | StageFactoryError::InvalidOption { stage_id, .. } => stage_id,
        }
    }
}

impl fmt::Display for StageFactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageFactoryError::UnknownOperation { stage_id, op } => {
                write!(f, "Stage '{}' uses unknown operation '{}'", stage_id, op)
            }
            StageFactoryError::MissingOption {
                stage_id,
                op,
                option,
            } => {
                write!(
                    f,
                    "Stage '{}' ({}) is missing required option '{}'",
                    stage_id, op, option
                )
            }
            StageFactoryError::InvalidOption {
                stage_id,
                option,
                reason,
            } => {
                write!(
                    f,
                    "Stage '{}' has invalid option '{}': {}",
                    stage_id, option, reason
                )
            }
        }
    }
}

impl Error for StageFactoryError {}
