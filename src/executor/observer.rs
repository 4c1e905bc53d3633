use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Reads the live state the apply loop diffs against between attempts.
#[async_trait]
pub trait StateObserver<S>: Send + Sync {
    async fn observe(&self) -> Result<S>;
}

#[async_trait]
impl<S, O> StateObserver<S> for Arc<O>
where
    S: Send + 'static,
    O: StateObserver<S> + ?Sized,
{
    async fn observe(&self) -> Result<S> {
        (**self).observe().await
    }
}
