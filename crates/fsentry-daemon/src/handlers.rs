//! Change handlers wired into the dispatcher.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use fsentry_suppress::{AllowListCache, AllowListSource, RevisionSuppressor, SuppressError};
use fsentry_wiki::{ChangeEvent, RevisionId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::ChangeHandler;

/// Canonical form of a page title: trimmed, `_` read as a space.
fn normalize_title(title: &str) -> String {
    title.trim().replace('_', " ")
}

/// Titles compare equal regardless of `_` vs space.
fn same_title(a: &str, b: &str) -> bool {
    normalize_title(a) == normalize_title(b)
}

// ---------------------------------------------------------------------------
// SuppressListedHandler
// ---------------------------------------------------------------------------

/// Submits changes to allow-listed pages for suppression.
pub struct SuppressListedHandler<Src, S> {
    cache: Arc<AllowListCache<Src>>,
    suppressor: S,
}

impl<Src, S> SuppressListedHandler<Src, S> {
    pub fn new(cache: Arc<AllowListCache<Src>>, suppressor: S) -> Self {
        Self { cache, suppressor }
    }
}

#[async_trait::async_trait]
impl<Src: AllowListSource, S: RevisionSuppressor> ChangeHandler for SuppressListedHandler<Src, S> {
    fn name(&self) -> &'static str {
        "suppress-listed"
    }

    async fn handle(&self, events: &[ChangeEvent]) -> Result<(), SuppressError> {
        let names = self.cache.get_all().await?;
        let titles: HashSet<String> = names.iter().map(|n| normalize_title(n)).collect();
        let listed: Vec<ChangeEvent> = events
            .iter()
            .filter(|e| titles.contains(&normalize_title(&e.subject)))
            .cloned()
            .collect();

        if listed.is_empty() {
            return Ok(());
        }
        info!(count = listed.len(), "listed changes found");
        self.suppressor.suppress_revisions(listed).await
    }
}

// ---------------------------------------------------------------------------
// ListUpdateHandler
// ---------------------------------------------------------------------------

/// Signals when the allow-list page itself received a new revision.
///
/// Repeated sightings of the same revision emit one signal only. The signal
/// channel holds at most one pending signal; extra ones are coalesced.
pub struct ListUpdateHandler {
    list_page: String,
    last_seen: Mutex<Option<RevisionId>>,
    signal: mpsc::Sender<()>,
}

impl ListUpdateHandler {
    pub fn new(list_page: impl Into<String>, signal: mpsc::Sender<()>) -> Self {
        Self {
            list_page: list_page.into(),
            last_seen: Mutex::new(None),
            signal,
        }
    }
}

#[async_trait::async_trait]
impl ChangeHandler for ListUpdateHandler {
    fn name(&self) -> &'static str {
        "list-update"
    }

    async fn handle(&self, events: &[ChangeEvent]) -> Result<(), SuppressError> {
        // Oldest first: the last match is the newest revision of the list.
        let Some(newest) = events
            .iter()
            .rev()
            .find(|e| same_title(&e.subject, &self.list_page))
        else {
            return Ok(());
        };

        {
            let mut last = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref() == Some(&newest.id) {
                return Ok(());
            }
            *last = Some(newest.id.clone());
        }

        match self.signal.try_send(()) {
            Ok(()) => info!(page = %self.list_page, rev = %newest.id, "allow-list changed"),
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!(rev = %newest.id, "allow-list change already pending")
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!(rev = %newest.id, "allow-list change signal has no receiver")
            }
        }
        Ok(())
    }
}
