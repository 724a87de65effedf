// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A worker pool or fan-out needs at least one worker
    ZeroWorkers,
    /// A timeout field was set to zero, which would time out every wait
    ZeroTimeout {
        /// The offending configuration field
        field: &'static str,
    },
    /// Two stages share the same ID
    DuplicateStageId {
        /// The duplicate stage ID
        stage_id: String,
    },
    /// A stage could not be built from its configuration
    InvalidStage {
        /// The stage that failed to build
        stage_id: String,
        /// Why the stage factory rejected it
        reason: String,
    },
    /// The selected strategy needs at least one stage
    EmptyStageChain {
        /// The strategy that was selected
        strategy: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroWorkers => {
                write!(f, "'workers' must be at least 1")
            }
            ValidationError::ZeroTimeout { field } => {
                write!(f, "'{}' must be greater than zero", field)
            }
            ValidationError::DuplicateStageId { stage_id } => {
                write!(f, "Duplicate stage ID: '{}'", stage_id)
            }
            ValidationError::InvalidStage { stage_id, reason } => {
                write!(f, "Stage '{}' is invalid: {}", stage_id, reason)
            }
            ValidationError::EmptyStageChain { strategy } => {
                write!(
                    f,
                    "Strategy '{}' requires at least one stage but none are configured",
                    strategy
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format for '{}' (expected .yaml, .yml or .toml)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Configuration validation failed:\n{}", join_lines(.0))]
    Validation(Vec<ValidationError>),
}

fn join_lines(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
