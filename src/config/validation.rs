// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Every check runs, and every problem found is returned, so a user fixing a
//! config sees the whole list at once:
//!
//! 1. **Sizing**: `workers` is at least 1, timeouts are non-zero
//! 2. **Uniqueness**: stage IDs are unique
//! 3. **Buildability**: every stage names a known operation with usable options
//! 4. **Shape**: `pipeline` and `fan_out_fan_in` have at least one stage
//!
//! `queue_capacity: 0` is valid and selects rendezvous queues.
//!
//! # Examples
//!
//! ```rust
//! use the_conduit::config::{validate_config, Config, StageConfig, Strategy};
//! use the_conduit::errors::ValidationError;
//! use std::collections::HashMap;
//!
//! let mut config = Config::new(Strategy::Pipeline);
//! config.workers = 0;
//! config.stages.push(StageConfig {
//!     id: "square".to_string(),
//!     op: "square".to_string(),
//!     options: HashMap::new(),
//! });
//!
//! let errors = validate_config(&config).unwrap_err();
//! assert_eq!(errors, vec![ValidationError::ZeroWorkers]);
//! ```

use std::collections::HashSet;

use crate::config::{Config, StageConfig};
use crate::errors::ValidationError;
use crate::observability::messages::validation::{
    DuplicateStageId, InvalidConfigValue, StageRejected,
};
use crate::observability::messages::StructuredLog;
use crate::stages::LocalStageFactory;

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_sizing(config);
    errors.extend(validate_unique_stage_ids(&config.stages));
    errors.extend(validate_stage_operations(&config.stages));

    if config.stages.is_empty() && config.strategy.requires_stages() {
        errors.push(ValidationError::EmptyStageChain {
            strategy: config.strategy.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_sizing(config: &Config) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.workers == 0 {
        InvalidConfigValue {
            field: "workers",
            reason: "must be at least 1",
        }
        .log();
        errors.push(ValidationError::ZeroWorkers);
    }

    if config.receive_timeout_ms == 0 {
        InvalidConfigValue {
            field: "receive_timeout_ms",
            reason: "must be greater than zero",
        }
        .log();
        errors.push(ValidationError::ZeroTimeout {
            field: "receive_timeout_ms",
        });
    }

    if config.task_timeout_ms == Some(0) {
        InvalidConfigValue {
            field: "task_timeout_ms",
            reason: "must be greater than zero when set",
        }
        .log();
        errors.push(ValidationError::ZeroTimeout {
            field: "task_timeout_ms",
        });
    }

    errors
}

/// Each duplicated ID is reported once, however often it repeats.
fn validate_unique_stage_ids(stages: &[StageConfig]) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut errors = Vec::new();

    for stage in stages {
        if !seen.insert(stage.id.as_str()) && reported.insert(stage.id.as_str()) {
            DuplicateStageId {
                stage_id: &stage.id,
            }
            .log();
            errors.push(ValidationError::DuplicateStageId {
                stage_id: stage.id.clone(),
            });
        }
    }

    errors
}

fn validate_stage_operations(stages: &[StageConfig]) -> Vec<ValidationError> {
    stages
        .iter()
        .filter_map(|stage| {
            LocalStageFactory::create_stage(stage).err().map(|e| {
                let reason = e.to_string();
                StageRejected {
                    stage_id: &stage.id,
                    reason: &reason,
                }
                .log();
                ValidationError::InvalidStage {
                    stage_id: stage.id.clone(),
                    reason,
                }
            })
        })
        .collect()
}
