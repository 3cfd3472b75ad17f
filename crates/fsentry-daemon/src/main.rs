//! fsentry-daemon entry point.
//!
//! Thin on purpose: tracing, config, secrets, Ctrl-C, then
//! [`fsentry_daemon::run`].

use anyhow::{Context, Result};
use clap::Parser;
use fsentry_config::{
    apply_env_overrides, load_layered_yaml, load_layered_yaml_from_strings, resolve_secrets,
    AllowListFreshness, LoadedConfig,
};
use fsentry_daemon::{run, RunOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fsentry-daemon")]
#[command(about = "Suppresses author and summary of revisions to allow-listed pages", long_about = None)]
struct Cli {
    /// YAML config paths in merge order (base -> site -> local). Repeatable.
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<String>,

    /// Skip the full allow-list suppression pass at startup.
    #[arg(long, default_value_t = false)]
    skip_init_fullscan: bool,

    /// Log suppression requests instead of sending them.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Print the merged config hash and canonical JSON, then exit.
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let loaded = load_config(&cli.config)?;

    if cli.print_config {
        println!("config_hash={}", loaded.config_hash);
        println!(
            "{}",
            serde_json::to_string_pretty(&loaded.config_json).context("config json serialize failed")?
        );
        return Ok(());
    }

    let mut cfg = loaded.config;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    let secrets = resolve_secrets(&cfg)?;

    info!(
        config_hash = %loaded.config_hash,
        endpoint = %cfg.api.endpoint,
        page = %cfg.allow_list.page,
        "fsentry-daemon starting"
    );
    if cfg.allow_list.freshness == AllowListFreshness::UntilInvalidated {
        warn!(
            "allow-list freshness is until_invalidated: a populated list is never re-fetched on age, \
             only after an allow-list change; set allow_list.freshness to ttl to expire it"
        );
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let opts = RunOptions {
        skip_initial_list_pass: cli.skip_init_fullscan,
        dry_run: cli.dry_run,
    };
    run(&cfg, &secrets, opts, cancel).await
}

fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return load_layered_yaml_from_strings(&[]).context("default config invalid");
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    load_layered_yaml(&refs)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable; run until killed");
        return;
    }
    info!("shutdown requested");
    cancel.cancel();
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
