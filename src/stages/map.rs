// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::traits::Stage;

/// A stage that transforms every value and forwards all of them.
///
/// ```
/// use the_conduit::stages::MapStage;
/// use the_conduit::traits::Stage;
///
/// # #[tokio::main]
/// # async fn main() {
/// let square = MapStage::new("square", |x: i64| x * x);
/// assert_eq!(square.apply(7).await, Some(49));
/// # }
/// ```
pub struct MapStage<F> {
    id: String,
    transform: F,
}

impl<F> MapStage<F> {
    pub fn new(id: impl Into<String>, transform: F) -> Self {
        Self {
            id: id.into(),
            transform,
        }
    }
}

#[async_trait]
impl<T, F> Stage<T> for MapStage<F>
where
    T: Send + 'static,
    F: Fn(T) -> T + Send + Sync,
{
    async fn apply(&self, value: T) -> Option<T> {
        Some((self.transform)(value))
    }

    fn id(&self) -> &str {
        &self.id
    }
}
