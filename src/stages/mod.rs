// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ready-made pipeline stages.
//!
//! [`MapStage`] and [`FilterStage`] wrap plain closures for any payload type.
//! [`LocalStageFactory`] builds the `i64` stages that configuration files can
//! refer to by name.

pub mod factory;
pub mod filter;
pub mod map;

pub use factory::{IntStage, LocalStageFactory};
pub use filter::FilterStage;
pub use map::MapStage;
