// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::traits::Stage;

/// A stage that forwards values unchanged when `predicate` holds and drops
/// them otherwise.
///
/// ```
/// use the_conduit::stages::FilterStage;
/// use the_conduit::traits::Stage;
///
/// # #[tokio::main]
/// # async fn main() {
/// let big = FilterStage::new("big", |x: &i64| *x > 20);
/// assert_eq!(big.apply(25).await, Some(25));
/// assert_eq!(big.apply(16).await, None);
/// # }
/// ```
pub struct FilterStage<P> {
    id: String,
    predicate: P,
}

impl<P> FilterStage<P> {
    pub fn new(id: impl Into<String>, predicate: P) -> Self {
        Self {
            id: id.into(),
            predicate,
        }
    }
}

#[async_trait]
impl<T, P> Stage<T> for FilterStage<P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync,
{
    async fn apply(&self, value: T) -> Option<T> {
        if (self.predicate)(&value) {
            Some(value)
        } else {
            None
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_filter_keeps_value_unchanged() {
        let even = FilterStage::new("even", |x: &i64| x % 2 == 0);
        assert_eq!(even.apply(4).await, Some(4));
        assert_eq!(even.apply(5).await, None);
    }

    #[tokio::test]
    async fn test_filter_on_owned_strings() {
        let non_empty = FilterStage::new("non_empty", |s: &String| !s.is_empty());
        assert_eq!(non_empty.apply("a".to_string()).await, Some("a".to_string()));
        assert_eq!(non_empty.apply(String::new()).await, None);
    }
}
