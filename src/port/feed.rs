//! Change feed port.

use async_trait::async_trait;

use crate::domain::UnitName;
use crate::error::FeedError;

/// A source of batches of changed unit names.
///
/// Batches arrive in order but may repeat names or carry names that no
/// longer matter; consumers must be safe to reconcile any name redundantly.
#[async_trait]
pub trait ChangeFeed: Send {
    /// Wait for the next batch. `None` means the feed has closed.
    async fn next_batch(&mut self) -> Option<Vec<UnitName>>;

    /// Why the feed closed, once `next_batch` has returned `None`.
    fn err(&self) -> Option<FeedError>;

    /// Stop the feed and release its upstream resources.
    async fn stop(&mut self) -> Result<(), FeedError>;
}
