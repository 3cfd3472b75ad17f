//! Scenario: change handlers and the allow-list pass
//!
//! # Invariants under test
//!
//! 1. Only changes to allow-listed pages are submitted for suppression.
//!    Titles match whether either side spells spaces as `_` or as spaces.
//! 2. A new revision of the allow-list page emits exactly one change signal;
//!    seeing the same revision again emits none.
//! 3. A failing handler does not stop later handlers from seeing the batch.
//! 4. The list task runs a startup pass, then on a change signal invalidates
//!    the cache and suppresses the pages of the NEW list.
//! 5. With the startup pass disabled nothing is fetched until a trigger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fsentry_daemon::{
    ChangeDispatcher, ChangeHandler, ListSuppressTask, ListUpdateHandler, SuppressListedHandler,
};
use fsentry_suppress::{
    AllowListCache, Freshness, PageAllowListSource, PageSuppressor, RevisionSuppressor,
    SuppressError,
};
use fsentry_wiki::{ApiError, ChangeEvent, RevisionRepository, UserInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const LIST: &str = "Project:Suppression list";

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

struct FakeWiki {
    list_text: Mutex<String>,
    list_fetches: AtomicUsize,
    histories: HashMap<String, Vec<ChangeEvent>>,
    history_calls: Mutex<Vec<String>>,
}

impl FakeWiki {
    fn new(list_text: &str, pages: &[&str]) -> Arc<Self> {
        let histories = pages
            .iter()
            .map(|p| {
                let revs = vec![ChangeEvent::new(format!("{p}#1").as_str(), *p, Utc::now())];
                (p.to_string(), revs)
            })
            .collect();
        Arc::new(Self {
            list_text: Mutex::new(list_text.to_string()),
            list_fetches: AtomicUsize::new(0),
            histories,
            history_calls: Mutex::new(Vec::new()),
        })
    }

    fn set_list(&self, text: &str) {
        *self.list_text.lock().unwrap() = text.to_string();
    }

    fn history_calls(&self) -> Vec<String> {
        self.history_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RevisionRepository for FakeWiki {
    async fn recent_changes(&self, _since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, ApiError> {
        Ok(vec![])
    }

    async fn page_revisions(&self, page: &str) -> Result<Vec<ChangeEvent>, ApiError> {
        self.history_calls.lock().unwrap().push(page.to_string());
        Ok(self.histories.get(page).cloned().unwrap_or_default())
    }

    async fn latest_page_content(&self, page: &str) -> Result<Option<String>, ApiError> {
        assert_eq!(page, LIST);
        self.list_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.list_text.lock().unwrap().clone()))
    }

    async fn user_info(&self) -> Result<UserInfo, ApiError> {
        Ok(UserInfo::default())
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn ids(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RevisionSuppressor for Recorder {
    async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError> {
        self.0
            .lock()
            .unwrap()
            .extend(revs.into_iter().map(|r| r.id.to_string()));
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait::async_trait]
impl ChangeHandler for AlwaysFails {
    fn name(&self) -> &'static str {
        "always-fails"
    }

    async fn handle(&self, _events: &[ChangeEvent]) -> Result<(), SuppressError> {
        Err(SuppressError::Stopped)
    }
}

type Cache = AllowListCache<PageAllowListSource<Arc<FakeWiki>>>;

fn cache(wiki: &Arc<FakeWiki>) -> Arc<Cache> {
    Arc::new(AllowListCache::new(
        PageAllowListSource::new(Arc::clone(wiki), LIST),
        Freshness::UntilInvalidated,
    ))
}

fn change(id: &str, page: &str) -> ChangeEvent {
    ChangeEvent::new(id, page, Utc::now())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_listed_pages_are_submitted() {
    let wiki = FakeWiki::new("Alpha\n  Beta  \n\n", &[]);
    let rec = Arc::new(Recorder::default());
    let handler = SuppressListedHandler::new(cache(&wiki), Arc::clone(&rec));

    handler
        .handle(&[
            change("1", "Alpha"),
            change("2", "Gamma"),
            change("3", "Beta"),
        ])
        .await
        .unwrap();

    assert_eq!(rec.ids(), vec!["1", "3"]);
}

#[tokio::test]
async fn listed_titles_match_across_underscores_and_spaces() {
    let wiki = FakeWiki::new("Project:Foo_bar\n  Baz qux \n", &[]);
    let rec = Arc::new(Recorder::default());
    let handler = SuppressListedHandler::new(cache(&wiki), Arc::clone(&rec));

    handler
        .handle(&[
            change("1", "Project:Foo bar"),
            change("2", "Baz_qux"),
            change("3", "Other"),
        ])
        .await
        .unwrap();

    assert_eq!(rec.ids(), vec!["1", "2"]);
}

#[tokio::test]
async fn list_revision_signals_once() {
    let (tx, mut rx) = mpsc::channel(1);
    let handler = ListUpdateHandler::new(LIST, tx);

    handler
        .handle(&[change("10", "Other"), change("11", LIST)])
        .await
        .unwrap();
    assert!(rx.try_recv().is_ok());

    handler.handle(&[change("11", LIST)]).await.unwrap();
    assert!(rx.try_recv().is_err(), "same revision must not signal again");

    handler
        .handle(&[change("12", "Project:Suppression_list")])
        .await
        .unwrap();
    assert!(rx.try_recv().is_ok());

    handler.handle(&[change("13", "Other")]).await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn failing_handler_does_not_starve_the_next() {
    let wiki = FakeWiki::new("Alpha", &[]);
    let rec = Arc::new(Recorder::default());
    let dispatcher = ChangeDispatcher::new()
        .with_handler(Arc::new(AlwaysFails))
        .with_handler(Arc::new(SuppressListedHandler::new(
            cache(&wiki),
            Arc::clone(&rec),
        )));

    dispatcher.dispatch(&[change("1", "Alpha")]).await;
    assert_eq!(rec.ids(), vec!["1"]);
}

// ---------------------------------------------------------------------------
// List pass
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn change_signal_reloads_list_and_runs_pass() {
    let wiki = FakeWiki::new("Alpha", &["Alpha", "Beta"]);
    let rec = Arc::new(Recorder::default());
    let cache = cache(&wiki);
    let (tx, rx) = mpsc::channel(1);

    let task = ListSuppressTask::new(
        PageSuppressor::new(Arc::clone(&wiki), Arc::clone(&rec)),
        Arc::clone(&cache),
        Duration::from_secs(900),
        true,
        rx,
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(task.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(wiki.history_calls(), vec!["Alpha"]);
    assert_eq!(rec.ids(), vec!["Alpha#1"]);

    wiki.set_list("Beta");
    tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(wiki.list_fetches.load(Ordering::SeqCst), 2);
    assert_eq!(wiki.history_calls(), vec!["Alpha", "Beta"]);

    // Periodic pass reuses the cached list.
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(wiki.list_fetches.load(Ordering::SeqCst), 2);
    assert_eq!(wiki.history_calls(), vec!["Alpha", "Beta", "Beta"]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn startup_pass_can_be_skipped() {
    let wiki = FakeWiki::new("Alpha", &["Alpha"]);
    let rec = Arc::new(Recorder::default());
    let (_tx, rx) = mpsc::channel(1);

    let task = ListSuppressTask::new(
        PageSuppressor::new(Arc::clone(&wiki), Arc::clone(&rec)),
        cache(&wiki),
        Duration::from_secs(900),
        false,
        rx,
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(task.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(wiki.list_fetches.load(Ordering::SeqCst), 0);
    assert!(wiki.history_calls().is_empty());

    cancel.cancel();
    handle.await.unwrap();
}
