// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::{FilterStage, MapStage};
use crate::config::StageConfig;
use crate::errors::StageFactoryError;
use crate::traits::Stage;

/// Shared handle to a built-in integer stage
pub type IntStage = Arc<dyn Stage<i64>>;

/// Factory for the built-in `i64` stages that configuration can name
pub struct LocalStageFactory;

impl LocalStageFactory {
    /// Create a stage from configuration
    ///
    /// The `op` field selects the stage:
    /// - "square", "double", "increment", "negate", "abs" -> MapStage
    /// - "add" (`amount`), "multiply" (`factor`) -> MapStage
    /// - "greater_than" / "less_than" (`threshold`) -> FilterStage
    /// - "even", "odd" -> FilterStage
    /// - "divisible_by" (`divisor`, non-zero) -> FilterStage
    ///
    /// Arithmetic saturates at the `i64` bounds instead of overflowing.
    pub fn create_stage(config: &StageConfig) -> Result<IntStage, StageFactoryError> {
        let id = config.id.clone();

        match config.op.as_str() {
            // Map stages
            "square" => Ok(Arc::new(MapStage::new(id, |x: i64| x.saturating_mul(x)))),
            "double" => Ok(Arc::new(MapStage::new(id, |x: i64| x.saturating_mul(2)))),
            "increment" => Ok(Arc::new(MapStage::new(id, |x: i64| x.saturating_add(1)))),
            "negate" => Ok(Arc::new(MapStage::new(id, |x: i64| x.saturating_neg()))),
            "abs" => Ok(Arc::new(MapStage::new(id, |x: i64| x.saturating_abs()))),
            "add" => {
                let amount = int_option(config, "amount")?;
                Ok(Arc::new(MapStage::new(id, move |x: i64| x.saturating_add(amount))))
            }
            "multiply" => {
                let factor = int_option(config, "factor")?;
                Ok(Arc::new(MapStage::new(id, move |x: i64| x.saturating_mul(factor))))
            }

            // Filter stages
            "greater_than" => {
                let threshold = int_option(config, "threshold")?;
                Ok(Arc::new(FilterStage::new(id, move |x: &i64| *x > threshold)))
            }
            "less_than" => {
                let threshold = int_option(config, "threshold")?;
                Ok(Arc::new(FilterStage::new(id, move |x: &i64| *x < threshold)))
            }
            "even" => Ok(Arc::new(FilterStage::new(id, |x: &i64| x % 2 == 0))),
            "odd" => Ok(Arc::new(FilterStage::new(id, |x: &i64| x % 2 != 0))),
            "divisible_by" => {
                let divisor = int_option(config, "divisor")?;
                if divisor == 0 {
                    return Err(StageFactoryError::InvalidOption {
                        stage_id: config.id.clone(),
                        option: "divisor",
                        reason: "must not be zero".to_string(),
                    });
                }
                Ok(Arc::new(FilterStage::new(id, move |x: &i64| x.wrapping_rem(divisor) == 0)))
            }

            _ => Err(StageFactoryError::UnknownOperation {
                stage_id: config.id.clone(),
                op: config.op.clone(),
            }),
        }
    }

    /// Build every stage of a chain, stopping at the first failure
    pub fn create_chain(configs: &[StageConfig]) -> Result<Vec<IntStage>, StageFactoryError> {
        configs.iter().map(Self::create_stage).collect()
    }

    /// List all available operations
    pub fn list_available_operations() -> Vec<&'static str> {
        vec![
            "square",
            "double",
            "increment",
            "negate",
            "abs",
            "add",
            "multiply",
            "greater_than",
            "less_than",
            "even",
            "odd",
            "divisible_by",
        ]
    }

    /// Check if an operation is available
    pub fn is_operation_available(op: &str) -> bool {
        Self::list_available_operations().contains(&op)
    }
}

fn int_option(config: &StageConfig, option: &'static str) -> Result<i64, StageFactoryError> {
    let value = config
        .options
        .get(option)
        .ok_or_else(|| StageFactoryError::MissingOption {
            stage_id: config.id.clone(),
            op: config.op.clone(),
            option,
        })?;

    value.as_i64().ok_or_else(|| StageFactoryError::InvalidOption {
        stage_id: config.id.clone(),
        option,
        reason: format!("expected an integer, found {:?}", value),
    })
}
