//! Size- and time-triggered batching in front of the gateway.
//!
//! Lifecycle is explicit: `new` builds an idle batcher, `start` spawns the
//! single worker, cancelling the token stops it. Producers call
//! [`RevisionSuppressor::suppress_revisions`] which only appends to the
//! buffer and queues a drain request; every handoff happens on the worker.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fsentry_wiki::{ChangeEvent, RevisionId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{RevisionSuppressor, SuppressError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainKind {
    /// Hand off exactly the first `capacity` candidates; no-op below capacity.
    Size,
    /// Hand off up to one batch, whatever is buffered.
    Force,
}

impl DrainKind {
    fn as_str(self) -> &'static str {
        match self {
            DrainKind::Size => "size",
            DrainKind::Force => "force",
        }
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// FIFO of distinct candidates. Only ever touched under the batcher mutex.
#[derive(Default)]
struct Buffer {
    events: Vec<ChangeEvent>,
    pending: HashSet<RevisionId>,
}

impl Buffer {
    fn append(&mut self, revs: Vec<ChangeEvent>) -> usize {
        let before = self.events.len();
        for rev in revs {
            if self.pending.insert(rev.id.clone()) {
                self.events.push(rev);
            }
        }
        self.events.len() - before
    }

    /// Split off the prefix a drain of `kind` hands off. At most one batch.
    fn take(&mut self, capacity: usize, kind: DrainKind) -> Option<Vec<ChangeEvent>> {
        let take = match kind {
            DrainKind::Size if self.events.len() >= capacity => capacity,
            DrainKind::Size => 0,
            DrainKind::Force => self.events.len().min(capacity),
        };
        if take == 0 {
            return None;
        }

        let batch: Vec<ChangeEvent> = self.events.drain(..take).collect();
        for rev in &batch {
            self.pending.remove(&rev.id);
        }
        Some(batch)
    }
}

// ---------------------------------------------------------------------------
// BatchSuppressor
// ---------------------------------------------------------------------------

struct Shared<S> {
    inner: S,
    capacity: usize,
    buffer: Mutex<Buffer>,
    stopped: AtomicBool,
}

impl<S: RevisionSuppressor> Shared<S> {
    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(&self, kind: DrainKind) {
        let Some(batch) = self.buffer().take(self.capacity, kind) else {
            return;
        };

        let count = batch.len();
        match self.inner.suppress_revisions(batch).await {
            Ok(()) => debug!(count, kind = kind.as_str(), "batch handed off"),
            Err(e) => warn!(count, kind = kind.as_str(), error = %e, "batch handoff failed"),
        }
    }
}

pub struct BatchSuppressor<S> {
    shared: Arc<Shared<S>>,
    flush_period: Option<Duration>,
    requests: mpsc::UnboundedSender<DrainKind>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<DrainKind>>>,
}

impl<S: RevisionSuppressor + 'static> BatchSuppressor<S> {
    /// `capacity` is clamped to at least 1. `flush_period` of `None` disables
    /// the time trigger.
    pub fn new(inner: S, capacity: usize, flush_period: Option<Duration>) -> Self {
        let (requests, receiver) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                inner,
                capacity: capacity.max(1),
                buffer: Mutex::new(Buffer::default()),
                stopped: AtomicBool::new(false),
            }),
            flush_period: flush_period.filter(|p| !p.is_zero()),
            requests,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of candidates waiting for a drain.
    pub fn buffered(&self) -> usize {
        self.shared.buffer().events.len()
    }

    /// Spawn the worker. Only the first call succeeds.
    pub fn start(&self, cancel: CancellationToken) -> Result<JoinHandle<()>, SuppressError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SuppressError::AlreadyStarted)?;

        info!(
            capacity = self.shared.capacity,
            flush_period_ms = self.flush_period.map(|p| p.as_millis() as u64),
            "batch worker starting"
        );
        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(run_worker(
            shared,
            receiver,
            self.flush_period,
            cancel,
        )))
    }

    /// Queue a time-style drain of whatever is buffered.
    pub fn force_drain(&self) -> Result<(), SuppressError> {
        self.request(DrainKind::Force)
    }

    fn request(&self, kind: DrainKind) -> Result<(), SuppressError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(SuppressError::Stopped);
        }
        self.requests
            .send(kind)
            .map_err(|_| SuppressError::Stopped)
    }
}

#[async_trait::async_trait]
impl<S: RevisionSuppressor + 'static> RevisionSuppressor for BatchSuppressor<S> {
    /// Non-blocking enqueue.
    async fn suppress_revisions(&self, revs: Vec<ChangeEvent>) -> Result<(), SuppressError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(SuppressError::Stopped);
        }
        if revs.is_empty() {
            return Ok(());
        }

        let (added, buffered) = {
            let mut buf = self.shared.buffer();
            let added = buf.append(revs);
            (added, buf.events.len())
        };
        debug!(added, buffered, "candidates buffered");

        self.request(DrainKind::Size)
    }
}

async fn run_worker<S: RevisionSuppressor>(
    shared: Arc<Shared<S>>,
    mut requests: mpsc::UnboundedReceiver<DrainKind>,
    flush_period: Option<Duration>,
    cancel: CancellationToken,
) {
    let mut ticker = flush_period.map(|period| {
        let mut t = tokio::time::interval_at(Instant::now() + period, period);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    });

    loop {
        let kind = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            req = requests.recv() => match req {
                Some(kind) => kind,
                None => break,
            },
            _ = tick(&mut ticker) => DrainKind::Force,
        };
        shared.drain(kind).await;
    }

    shared.stopped.store(true, Ordering::SeqCst);
    let abandoned = shared.buffer().events.len();
    if abandoned > 0 {
        warn!(abandoned, "batch worker stopped with buffered candidates");
    } else {
        info!("batch worker stopped");
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}
