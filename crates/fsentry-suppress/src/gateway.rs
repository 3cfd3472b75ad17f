//! Turns one batch of candidates into one `revisiondelete` call.

use std::collections::HashSet;

use fsentry_wiki::{
    Action, ActionExecutor, ActionOutcome, ApiError, ChangeEvent, RevisionId, SuppressRevisions,
};
use tracing::{info, warn};

use crate::{RevisionSuppressor, SuppressError};

/// Last stage of the chain.
///
/// Already-suppressed revisions are dropped again here, duplicates are
/// collapsed, and an empty remainder short-circuits without any remote call.
/// Otherwise exactly one suppress action is executed per invocation, hiding
/// author and comment with suppression enabled. In dry-run mode the ids are
/// logged and nothing is sent.
pub struct SuppressionGateway<E> {
    executor: E,
    dry_run: bool,
}

impl<E: ActionExecutor> SuppressionGateway<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

fn distinct_unsuppressed(revs: Vec<ChangeEvent>) -> Vec<RevisionId> {
    let mut seen = HashSet::new();
    revs.into_iter()
        .filter(|r| !r.suppressed)
        .map(|r| r.id)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[async_trait::async_trait]
impl<E: ActionExecutor> RevisionSuppressor for SuppressionGateway<E> {
    async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError> {
        let ids = distinct_unsuppressed(revs);
        if ids.is_empty() {
            return Ok(());
        }

        let count = ids.len();
        if self.dry_run {
            let joined: Vec<&str> = ids.iter().map(RevisionId::as_str).collect();
            info!(count, ids = %joined.join(","), "dry run: would suppress revisions");
            return Ok(());
        }

        let action = Action::Suppress(SuppressRevisions::author_and_comment(ids));
        match self.executor.execute(action).await? {
            ActionOutcome::Suppressed(report) => {
                if !report.failed.is_empty() {
                    let failed: Vec<&str> = report.failed.iter().map(RevisionId::as_str).collect();
                    warn!(
                        count,
                        failed = %failed.join(","),
                        status = %report.status,
                        "some revisions were not suppressed"
                    );
                }
                info!(count, succeeded = report.succeeded, "revisions suppressed");
                Ok(())
            }
            other => Err(SuppressError::Api(ApiError::UnexpectedResponse(format!(
                "suppress returned {}",
                other.kind()
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn duplicates_and_suppressed_are_dropped() {
        let now = Utc::now();
        let ids = distinct_unsuppressed(vec![
            ChangeEvent::new("3", "A", now),
            ChangeEvent::new("1", "A", now),
            ChangeEvent::new("3", "B", now),
            ChangeEvent::new("2", "A", now).with_suppressed(true),
        ]);
        assert_eq!(ids, vec![RevisionId::from("3"), RevisionId::from("1")]);
    }
}
