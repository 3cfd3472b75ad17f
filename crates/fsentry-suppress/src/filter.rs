//! Drops revisions that are already suppressed upstream.

use fsentry_wiki::ChangeEvent;
use tracing::debug;

use crate::{RevisionSuppressor, SuppressError};

pub struct FilteringSuppressor<S> {
    inner: S,
}

impl<S> FilteringSuppressor<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<S: RevisionSuppressor> RevisionSuppressor for FilteringSuppressor<S> {
    async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError> {
        let total = revs.len();
        let pending: Vec<ChangeEvent> = revs.into_iter().filter(|r| !r.suppressed).collect();

        if pending.len() < total {
            debug!(
                skipped = total - pending.len(),
                kept = pending.len(),
                "skipping already suppressed revisions"
            );
        }
        if pending.is_empty() {
            return Ok(());
        }
        self.inner.suppress_revisions(pending).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<String>>>);

    #[async_trait::async_trait]
    impl RevisionSuppressor for Recorder {
        async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError> {
            self.0
                .lock()
                .unwrap()
                .push(revs.iter().map(|r| r.id.to_string()).collect());
            Ok(())
        }
    }

    #[tokio::test]
    async fn suppressed_revisions_never_reach_inner() {
        let f = FilteringSuppressor::new(Recorder::default());
        let now = Utc::now();
        f.suppress_revisions(vec![
            ChangeEvent::new("1", "A", now),
            ChangeEvent::new("2", "A", now).with_suppressed(true),
            ChangeEvent::new("3", "B", now),
        ])
        .await
        .unwrap();
        f.suppress_revisions(vec![ChangeEvent::new("4", "A", now).with_suppressed(true)])
            .await
            .unwrap();

        assert_eq!(*f.inner().0.lock().unwrap(), vec![vec!["1", "3"]]);
    }
}
