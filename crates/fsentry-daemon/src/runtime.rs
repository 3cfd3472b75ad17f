//! Builds the pipeline from config and runs it until cancelled.

use std::sync::Arc;

use anyhow::{Context, Result};
use fsentry_config::{AllowListFreshness, ResolvedSecrets, SentryConfig};
use fsentry_http::{build_transport, TransportOptions};
use fsentry_suppress::{
    AllowListCache, BatchSuppressor, FilteringSuppressor, Freshness, PageAllowListSource,
    PageSuppressor, SuppressionGateway,
};
use fsentry_wiki::{ApiRevisionRepository, MediaWikiApi};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::capability::check_capability;
use crate::dispatch::ChangeDispatcher;
use crate::handlers::{ListUpdateHandler, SuppressListedHandler};
use crate::scanner::ChangeScanner;
use crate::tasks::{ListSuppressTask, ScanTask};
use crate::watermark::Watermark;

/// Command-line switches layered over the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub skip_initial_list_pass: bool,
    pub dry_run: bool,
}

pub fn transport_options(cfg: &SentryConfig) -> TransportOptions {
    TransportOptions {
        timeout: cfg.api.timeout(),
        burst: cfg.rate_limit.burst,
        window: cfg.rate_limit.window(),
        penalty: cfg.rate_limit.penalty(),
        max_attempts: cfg.retry.max_attempts,
        backoff_base: cfg.retry.backoff_base(),
    }
}

pub fn freshness(cfg: &SentryConfig) -> Freshness {
    match cfg.allow_list.freshness {
        AllowListFreshness::UntilInvalidated => Freshness::UntilInvalidated,
        AllowListFreshness::Ttl { secs } => Freshness::Ttl(std::time::Duration::from_secs(secs)),
    }
}

/// Wire every stage and block until `cancel` fires.
///
/// Fails fast (before any task starts) when the transport cannot be built or
/// the account lacks the suppression right.
pub async fn run(
    cfg: &SentryConfig,
    secrets: &ResolvedSecrets,
    opts: RunOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let transport = build_transport(&transport_options(cfg), cancel.clone())
        .context("failed to build http transport")?;
    let api = Arc::new(MediaWikiApi::new(
        transport,
        cfg.api.endpoint.clone(),
        secrets.access_token.clone(),
        cfg.api.user_agent.clone(),
    ));
    let repo = Arc::new(ApiRevisionRepository::new(Arc::clone(&api)));

    check_capability(repo.as_ref()).await?;

    // filter -> batcher -> gateway
    let dry_run = cfg.dry_run || opts.dry_run;
    if dry_run {
        warn!("dry run: suppression requests will be logged, not sent");
    }
    let gateway = SuppressionGateway::new(Arc::clone(&api)).dry_run(dry_run);
    let batcher = Arc::new(BatchSuppressor::new(
        gateway,
        cfg.batch.capacity,
        cfg.batch.flush_period(),
    ));
    let batch_worker = batcher
        .start(cancel.clone())
        .context("failed to start batch worker")?;
    let pipeline = Arc::new(FilteringSuppressor::new(Arc::clone(&batcher)));

    let list_page = cfg.allow_list.page.clone();
    let cache = Arc::new(AllowListCache::new(
        PageAllowListSource::new(Arc::clone(&repo), list_page.clone()),
        freshness(cfg),
    ));

    let (events_tx, events_rx) = mpsc::channel(1);
    let (list_tx, list_rx) = mpsc::channel(1);

    let dispatcher = ChangeDispatcher::new()
        .with_handler(Arc::new(ListUpdateHandler::new(list_page.clone(), list_tx)))
        .with_handler(Arc::new(SuppressListedHandler::new(
            Arc::clone(&cache),
            Arc::clone(&pipeline),
        )));

    let scan = ScanTask::new(
        ChangeScanner::new(Arc::clone(&repo), events_tx),
        cfg.scan.interval(),
        Watermark::lookback(cfg.scan.initial_lookback()),
    );

    let list_pass = ListSuppressTask::new(
        PageSuppressor::new(Arc::clone(&repo), Arc::clone(&pipeline)),
        Arc::clone(&cache),
        cfg.scan.list_pass_interval(),
        !(cfg.scan.skip_initial_list_pass || opts.skip_initial_list_pass),
        list_rx,
    );

    info!(page = %list_page, endpoint = %cfg.api.endpoint, "pipeline started");

    let dispatch_task = tokio::spawn(dispatcher.run(events_rx, cancel.clone()));
    let scan_task = tokio::spawn(scan.run(cancel.clone()));
    let list_task = tokio::spawn(list_pass.run(cancel.clone()));

    let (dispatch_res, scan_res, list_res, batch_res) =
        tokio::join!(dispatch_task, scan_task, list_task, batch_worker);
    dispatch_res.context("change dispatcher panicked")?;
    let watermark = scan_res.context("scan task panicked")?;
    list_res.context("list suppress task panicked")?;
    batch_res.context("batch worker panicked")?;

    info!(watermark = %watermark, "pipeline stopped");
    Ok(())
}
