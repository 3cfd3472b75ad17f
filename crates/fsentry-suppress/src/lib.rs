//! fsentry-suppress
//!
//! The suppression side of the pipeline:
//!
//! ```text
//! FilteringSuppressor -> BatchSuppressor -> SuppressionGateway -> ActionExecutor
//! ```
//!
//! Every stage implements [`RevisionSuppressor`], so stages compose by
//! wrapping. [`AllowListCache`] decides which pages are eligible at all and
//! [`PageSuppressor`] feeds whole page histories into the same chain.

mod batcher;
mod cache;
mod error;
mod filter;
mod gateway;
mod page;

pub use batcher::{BatchSuppressor, DrainKind};
pub use cache::{AllowListCache, AllowListSource, Freshness, PageAllowListSource};
pub use error::SuppressError;
pub use filter::FilteringSuppressor;
pub use gateway::SuppressionGateway;
pub use page::{PageSuppressor, PassSummary};

use std::sync::Arc;

use fsentry_wiki::ChangeEvent;

/// A stage that accepts suppression candidates.
#[async_trait::async_trait]
pub trait RevisionSuppressor: Send + Sync {
    async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError>;
}

#[async_trait::async_trait]
impl<T: RevisionSuppressor + ?Sized> RevisionSuppressor for Arc<T> {
    async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError> {
        (**self).suppress_revisions(revs).await
    }
}
