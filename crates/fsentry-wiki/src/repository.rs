//! Typed reads over an [`ActionExecutor`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::action::{Action, ActionOutcome, FetchRevisions, ListChanges};
use crate::api::ActionExecutor;
use crate::error::ApiError;
use crate::model::{ChangeEvent, UserInfo};

/// The reads the pipeline needs from the remote wiki.
#[async_trait::async_trait]
pub trait RevisionRepository: Send + Sync {
    /// Top-revision, non-bot edits at or after `since`, oldest first.
    async fn recent_changes(&self, since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, ApiError>;

    /// Revision history of `page`. A missing page has no revisions.
    async fn page_revisions(&self, page: &str) -> Result<Vec<ChangeEvent>, ApiError>;

    /// Text of the newest revision of `page`, `None` when the page is missing.
    async fn latest_page_content(&self, page: &str) -> Result<Option<String>, ApiError>;

    async fn user_info(&self) -> Result<UserInfo, ApiError>;
}

#[async_trait::async_trait]
impl<T: RevisionRepository + ?Sized> RevisionRepository for Arc<T> {
    async fn recent_changes(&self, since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, ApiError> {
        (**self).recent_changes(since).await
    }

    async fn page_revisions(&self, page: &str) -> Result<Vec<ChangeEvent>, ApiError> {
        (**self).page_revisions(page).await
    }

    async fn latest_page_content(&self, page: &str) -> Result<Option<String>, ApiError> {
        (**self).latest_page_content(page).await
    }

    async fn user_info(&self) -> Result<UserInfo, ApiError> {
        (**self).user_info().await
    }
}

pub struct ApiRevisionRepository<E> {
    executor: E,
}

impl<E: ActionExecutor> ApiRevisionRepository<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    async fn revisions(&self, q: FetchRevisions) -> Result<Vec<ChangeEvent>, ApiError> {
        match self.executor.execute(Action::FetchRevisions(q)).await? {
            ActionOutcome::Revisions(revs) => Ok(revs),
            other => Err(mismatch("fetch-revisions", &other)),
        }
    }
}

#[async_trait::async_trait]
impl<E: ActionExecutor> RevisionRepository for ApiRevisionRepository<E> {
    async fn recent_changes(&self, since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, ApiError> {
        match self
            .executor
            .execute(Action::ListChanges(ListChanges::since(since)))
            .await?
        {
            ActionOutcome::Changes(events) => Ok(events),
            other => Err(mismatch("list-changes", &other)),
        }
    }

    async fn page_revisions(&self, page: &str) -> Result<Vec<ChangeEvent>, ApiError> {
        self.revisions(FetchRevisions::history(page)).await
    }

    async fn latest_page_content(&self, page: &str) -> Result<Option<String>, ApiError> {
        let revs = self.revisions(FetchRevisions::latest_content(page)).await?;
        Ok(revs.into_iter().next().map(|r| r.content.unwrap_or_default()))
    }

    async fn user_info(&self) -> Result<UserInfo, ApiError> {
        match self.executor.execute(Action::CheckCapability).await? {
            ActionOutcome::Capability(info) => Ok(info),
            other => Err(mismatch("check-capability", &other)),
        }
    }
}

fn mismatch(action: &str, got: &ActionOutcome) -> ApiError {
    ApiError::UnexpectedResponse(format!("{action} returned {}", got.kind()))
}

/// Allow-list page text to page titles: one per line, trimmed, blanks skipped.
pub fn split_allow_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RevisionId;

    struct Fixed(ActionOutcome);

    #[async_trait::async_trait]
    impl ActionExecutor for Fixed {
        async fn execute(&self, _action: Action) -> Result<ActionOutcome, ApiError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn allow_list_lines_are_trimmed() {
        let text = "  Main Page \n\n\tSandbox\r\n   \nUser:Alice";
        assert_eq!(
            split_allow_list(text),
            vec!["Main Page", "Sandbox", "User:Alice"]
        );
        assert!(split_allow_list("").is_empty());
    }

    #[tokio::test]
    async fn mismatched_outcome_is_unexpected() {
        let repo = ApiRevisionRepository::new(Fixed(ActionOutcome::Token("t".into())));
        let err = repo.recent_changes(Utc::now()).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn latest_content_of_missing_page_is_none() {
        let repo = ApiRevisionRepository::new(Fixed(ActionOutcome::Revisions(vec![])));
        assert_eq!(repo.latest_page_content("Nope").await.unwrap(), None);

        let rev = ChangeEvent::new(RevisionId::from(3u64), "List", Utc::now()).with_content("A\nB");
        let repo = ApiRevisionRepository::new(Fixed(ActionOutcome::Revisions(vec![rev])));
        assert_eq!(
            repo.latest_page_content("List").await.unwrap().as_deref(),
            Some("A\nB")
        );
    }
}
