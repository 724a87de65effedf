// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::future::Future;

use crate::errors::ProcessingError;

/// The processing function a worker pool applies to each task payload.
///
/// Handlers must not depend on which worker runs them: workers are
/// interchangeable and results come back in no particular order.
#[async_trait]
pub trait TaskHandler<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn handle(&self, input: I) -> Result<O, ProcessingError>;

    fn name(&self) -> &str {
        "handler"
    }
}

/// Adapter turning an async closure into a [`TaskHandler`].
///
/// ```
/// use the_conduit::errors::ProcessingError;
/// use the_conduit::traits::{handler_fn, TaskHandler};
///
/// # #[tokio::main]
/// # async fn main() {
/// let double = handler_fn(|x: i64| async move { Ok::<_, ProcessingError>(x * 2) });
/// assert_eq!(double.handle(21).await, Ok(42));
/// # }
/// ```
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler { f }
}

#[async_trait]
impl<I, O, F, Fut> TaskHandler<I, O> for FnHandler<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ProcessingError>> + Send,
{
    async fn handle(&self, input: I) -> Result<O, ProcessingError> {
        (self.f)(input).await
    }

    fn name(&self) -> &str {
        "fn_handler"
    }
}
