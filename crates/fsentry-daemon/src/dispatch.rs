//! Fan-out of scanned batches to an ordered handler chain.

use std::sync::Arc;

use fsentry_suppress::SuppressError;
use fsentry_wiki::ChangeEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait ChangeHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, events: &[ChangeEvent]) -> Result<(), SuppressError>;
}

/// Runs every handler, in registration order, on every batch.
///
/// A failing handler is logged; the remaining handlers still see the batch.
#[derive(Default)]
pub struct ChangeDispatcher {
    handlers: Vec<Arc<dyn ChangeHandler>>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn ChangeHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub async fn dispatch(&self, events: &[ChangeEvent]) {
        for h in &self.handlers {
            if let Err(e) = h.handle(events).await {
                warn!(handler = h.name(), count = events.len(), error = %e, "change handler failed");
            }
        }
    }

    /// Consume batches until cancelled or every sender is dropped.
    pub async fn run(
        self,
        mut batches: mpsc::Receiver<Vec<ChangeEvent>>,
        cancel: CancellationToken,
    ) {
        loop {
            let events = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = batches.recv() => match batch {
                    Some(events) => events,
                    None => break,
                },
            };
            self.dispatch(&events).await;
        }
        info!("change dispatcher stopped");
    }
}
