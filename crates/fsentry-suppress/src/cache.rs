//! Allow-list cache with out-of-band invalidation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fsentry_wiki::{split_allow_list, ApiError, RevisionRepository};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::SuppressError;

/// Where the allow-list names come from.
#[async_trait::async_trait]
pub trait AllowListSource: Send + Sync {
    async fn allow_list_names(&self) -> Result<Vec<String>, ApiError>;
}

#[async_trait::async_trait]
impl<T: AllowListSource + ?Sized> AllowListSource for Arc<T> {
    async fn allow_list_names(&self) -> Result<Vec<String>, ApiError> {
        (**self).allow_list_names().await
    }
}

/// Reads the newest revision of one page, one name per line.
pub struct PageAllowListSource<R> {
    repo: R,
    page: String,
}

impl<R: RevisionRepository> PageAllowListSource<R> {
    pub fn new(repo: R, page: impl Into<String>) -> Self {
        Self {
            repo,
            page: page.into(),
        }
    }
}

#[async_trait::async_trait]
impl<R: RevisionRepository> AllowListSource for PageAllowListSource<R> {
    async fn allow_list_names(&self) -> Result<Vec<String>, ApiError> {
        match self.repo.latest_page_content(&self.page).await? {
            Some(text) => Ok(split_allow_list(&text)),
            None => {
                warn!(page = %self.page, "allow-list page does not exist");
                Ok(Vec::new())
            }
        }
    }
}

/// How long a populated cache is served without re-fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Populated means fresh; only [`AllowListCache::invalidate`] forces a
    /// re-fetch.
    #[default]
    UntilInvalidated,
    /// Re-fetch once the entry is older than the given age.
    Ttl(Duration),
}

struct Entry {
    names: Arc<HashSet<String>>,
    fetched_at: Instant,
}

/// Wholesale-refreshed set of page names eligible for suppression.
///
/// Concurrent readers share one fetch: the state lock is held across the
/// upstream call. A failed fetch leaves the cache empty and the next read
/// tries again; stale names are never served after an invalidation.
pub struct AllowListCache<Src> {
    source: Src,
    freshness: Freshness,
    entry: Mutex<Option<Entry>>,
    invalidated: AtomicBool,
}

impl<Src: AllowListSource> AllowListCache<Src> {
    pub fn new(source: Src, freshness: Freshness) -> Self {
        Self {
            source,
            freshness,
            entry: Mutex::new(None),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Drop the cached set on the next read. Never blocks.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub async fn get_all(&self) -> Result<Arc<HashSet<String>>, SuppressError> {
        let mut entry = self.entry.lock().await;

        if self.invalidated.swap(false, Ordering::SeqCst) {
            *entry = None;
        }

        if let Some(e) = entry.as_ref() {
            if self.is_fresh(e) {
                return Ok(Arc::clone(&e.names));
            }
        }

        *entry = None;
        let names: HashSet<String> = self
            .source
            .allow_list_names()
            .await
            .map_err(SuppressError::CacheRefresh)?
            .into_iter()
            .collect();
        info!(count = names.len(), "allow-list refreshed");

        let names = Arc::new(names);
        *entry = Some(Entry {
            names: Arc::clone(&names),
            fetched_at: Instant::now(),
        });
        Ok(names)
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        match self.freshness {
            Freshness::UntilInvalidated => true,
            Freshness::Ttl(ttl) => entry.fetched_at.elapsed() < ttl,
        }
    }
}
