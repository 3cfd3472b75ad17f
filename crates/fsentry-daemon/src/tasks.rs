//! Periodic tasks. Each owns its schedule and returns once cancelled.

use std::sync::Arc;
use std::time::Duration;

use fsentry_suppress::{AllowListCache, AllowListSource, PageSuppressor, RevisionSuppressor};
use fsentry_wiki::RevisionRepository;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scanner::{ChangeScanner, ScanError};
use crate::watermark::Watermark;

// ---------------------------------------------------------------------------
// ScanTask
// ---------------------------------------------------------------------------

/// Strictly sequential recent-changes polling.
///
/// A failed scan keeps the last good watermark; the next tick retries from it.
pub struct ScanTask<R> {
    scanner: ChangeScanner<R>,
    interval: Duration,
    watermark: Watermark,
}

impl<R: RevisionRepository> ScanTask<R> {
    pub fn new(scanner: ChangeScanner<R>, interval: Duration, start: Watermark) -> Self {
        Self {
            scanner,
            interval,
            watermark: start,
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Run one scan and fold the result into the watermark.
    pub async fn tick(&mut self) -> Result<usize, ScanError> {
        let (next, events) = self.scanner.scan(self.watermark).await?;
        if self.watermark.advance(next) {
            info!(count = events.len(), watermark = %self.watermark, "watermark advanced");
        }
        Ok(events.len())
    }

    /// Returns the final watermark.
    pub async fn run(mut self, cancel: CancellationToken) -> Watermark {
        info!(watermark = %self.watermark, interval_ms = self.interval.as_millis() as u64, "scan task starting");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(_) => {}
                Err(ScanError::DownstreamClosed) => {
                    warn!("change dispatcher closed; stopping scan task");
                    break;
                }
                Err(ScanError::Api(e)) if e.is_cancelled() => break,
                Err(e) => warn!(watermark = %self.watermark, error = %e, "scan failed; keeping watermark"),
            }
        }

        info!(watermark = %self.watermark, "scan task stopped");
        self.watermark
    }
}

// ---------------------------------------------------------------------------
// ListSuppressTask
// ---------------------------------------------------------------------------

enum Trigger {
    Periodic,
    ListChanged,
    SignalClosed,
}

/// Full re-suppression of every allow-listed page.
///
/// Runs once at start (unless disabled), then every `interval`, and right
/// after each allow-list change signal. A change signal invalidates the
/// cache before the pass so the new list is used.
pub struct ListSuppressTask<R, Src, S> {
    pages: PageSuppressor<R, S>,
    cache: Arc<AllowListCache<Src>>,
    interval: Duration,
    run_initial: bool,
    updates: Option<mpsc::Receiver<()>>,
}

impl<R, Src, S> ListSuppressTask<R, Src, S>
where
    R: RevisionRepository,
    Src: AllowListSource,
    S: RevisionSuppressor,
{
    pub fn new(
        pages: PageSuppressor<R, S>,
        cache: Arc<AllowListCache<Src>>,
        interval: Duration,
        run_initial: bool,
        updates: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            pages,
            cache,
            interval,
            run_initial,
            updates: Some(updates),
        }
    }

    /// One pass over the current allow-list. Returns the number of pages visited.
    pub async fn pass(&self, reason: &'static str, cancel: &CancellationToken) -> usize {
        let names = match self.cache.get_all().await {
            Ok(n) => n,
            Err(e) => {
                warn!(reason, error = %e, "list pass skipped");
                return 0;
            }
        };
        let mut pages: Vec<String> = names.iter().cloned().collect();
        pages.sort();

        info!(reason, pages = pages.len(), "list pass starting");
        let summary = self.pages.suppress_pages(&pages, cancel).await;
        info!(
            reason,
            pages = summary.pages,
            revisions = summary.revisions,
            failed_pages = summary.failed_pages,
            "list pass finished"
        );
        summary.pages
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        if self.run_initial {
            self.pass("startup", &cancel).await;
        } else {
            info!("startup list pass skipped");
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sig = next_signal(&mut self.updates) => match sig {
                    Some(()) => Trigger::ListChanged,
                    None => Trigger::SignalClosed,
                },
                _ = ticker.tick() => Trigger::Periodic,
            };

            match trigger {
                Trigger::Periodic => {
                    self.pass("periodic", &cancel).await;
                }
                Trigger::ListChanged => {
                    self.cache.invalidate();
                    self.pass("list-changed", &cancel).await;
                }
                Trigger::SignalClosed => self.updates = None,
            }
        }

        info!("list suppress task stopped");
    }
}

async fn next_signal(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
