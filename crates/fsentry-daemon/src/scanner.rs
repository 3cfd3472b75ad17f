//! Incremental recent-changes scanning.

use std::fmt;

use fsentry_wiki::{ApiError, ChangeEvent, RevisionRepository};
use tokio::sync::mpsc;
use tracing::debug;

use crate::watermark::Watermark;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    Api(ApiError),
    /// The dispatcher is gone; scanning is pointless.
    DownstreamClosed,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Api(e) => write!(f, "recent changes query failed: {e}"),
            ScanError::DownstreamClosed => write!(f, "change dispatcher closed"),
        }
    }
}

impl std::error::Error for ScanError {}

/// Polls for changes newer than a watermark and forwards them downstream.
///
/// Delivery is at-least-once: events are forwarded before the new watermark
/// is returned, so a lost watermark only causes re-delivery.
pub struct ChangeScanner<R> {
    repo: R,
    downstream: mpsc::Sender<Vec<ChangeEvent>>,
}

impl<R: RevisionRepository> ChangeScanner<R> {
    pub fn new(repo: R, downstream: mpsc::Sender<Vec<ChangeEvent>>) -> Self {
        Self { repo, downstream }
    }

    /// On error the caller keeps its previous watermark.
    pub async fn scan(
        &self,
        since: Watermark,
    ) -> Result<(Watermark, Vec<ChangeEvent>), ScanError> {
        let events = self
            .repo
            .recent_changes(since.at())
            .await
            .map_err(ScanError::Api)?;

        if events.is_empty() {
            return Ok((since, events));
        }

        let next = since.after_events(&events);
        debug!(count = events.len(), since = %since, next = %next, "changes scanned");

        self.downstream
            .send(events.clone())
            .await
            .map_err(|_| ScanError::DownstreamClosed)?;

        Ok((next, events))
    }
}
