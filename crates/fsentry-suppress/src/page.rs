//! Whole-page suppression passes over the allow-list.

use fsentry_wiki::RevisionRepository;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{RevisionSuppressor, SuppressError};

/// Outcome of one pass over a set of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    pub pages: usize,
    pub revisions: usize,
    pub failed_pages: usize,
}

/// Submits the full revision history of pages to a suppressor chain.
pub struct PageSuppressor<R, S> {
    repo: R,
    suppressor: S,
}

impl<R: RevisionRepository, S: RevisionSuppressor> PageSuppressor<R, S> {
    pub fn new(repo: R, suppressor: S) -> Self {
        Self { repo, suppressor }
    }

    /// Returns the number of revisions submitted.
    pub async fn suppress_page(&self, page: &str) -> Result<usize, SuppressError> {
        let revs = self.repo.page_revisions(page).await?;
        let count = revs.len();
        debug!(page, count, "submitting page history");
        self.suppressor.suppress_revisions(revs).await?;
        Ok(count)
    }

    /// Suppress every page in `pages`, in order. A failing page is logged and
    /// skipped; cancellation ends the pass early.
    pub async fn suppress_pages(&self, pages: &[String], cancel: &CancellationToken) -> PassSummary {
        let mut summary = PassSummary::default();
        for page in pages {
            if cancel.is_cancelled() {
                info!(done = summary.pages, total = pages.len(), "list pass cancelled");
                break;
            }
            summary.pages += 1;
            match self.suppress_page(page).await {
                Ok(n) => summary.revisions += n,
                Err(e) => {
                    summary.failed_pages += 1;
                    warn!(page = %page, error = %e, "page suppression failed");
                }
            }
        }
        summary
    }
}
