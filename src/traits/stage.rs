// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

/// One transform/filter step of a pipeline.
///
/// `apply` returns `Some(value)` to forward a (possibly transformed) value to
/// the next stage and `None` to drop it. A map stage always returns `Some`; a
/// filter stage returns its input unchanged or `None`.
#[async_trait]
pub trait Stage<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn apply(&self, value: T) -> Option<T>;

    /// Identifier used in logs and stage state reports.
    fn id(&self) -> &str;
}
