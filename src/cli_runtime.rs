use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use canvex::model::{RemoteConfig, SyncConfig};
use canvex::remote::HttpRemote;
use canvex::store::LocalCache;
use canvex::workspace::Workspace;

use crate::Cli;

const JOB_WAIT_TICK: Duration = Duration::from_millis(250);

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_env("CANVEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::cli_exec::handle_command(cli).await
}

/// Effective config: file, then environment, then command-line flags.
pub(crate) fn effective_config(cli: &Cli, cache: &LocalCache) -> Result<SyncConfig> {
    let mut cfg = cache.read_config().context("read config")?;
    cfg.apply_env();
    if let Some(url) = cli.base_url.as_deref() {
        let token = cfg.remote.as_ref().and_then(|r| r.token.clone());
        cfg.remote = Some(RemoteConfig {
            base_url: url.to_string(),
            token,
        });
    }
    if let Some(ws) = cli.workspace.as_deref() {
        cfg.workspace = ws.to_string();
    }
    Ok(cfg)
}

pub(crate) fn require_remote(cfg: &SyncConfig) -> Result<RemoteConfig> {
    cfg.remote
        .clone()
        .context("no remote configured (run `canvex remote set --url ...` or pass --base-url)")
}

pub(crate) fn open_workspace(cli: &Cli) -> Result<Workspace> {
    let cache = LocalCache::open_or_init(&cli.cache_dir)
        .with_context(|| format!("open cache {}", cli.cache_dir.display()))?;
    let cfg = effective_config(cli, &cache)?;
    let remote = HttpRemote::new(require_remote(&cfg)?)?;
    let cache = cache.with_workspace(&cfg.workspace);
    Ok(Workspace::new(cfg, cache, Arc::new(remote)))
}

/// Blocks until every poll task has finished.
pub(crate) async fn wait_for_jobs(ws: &Workspace) {
    let mut last = usize::MAX;
    loop {
        let inflight = ws.polling_count();
        if inflight == 0 {
            return;
        }
        if inflight != last {
            eprintln!("waiting for {} job(s)...", inflight);
            last = inflight;
        }
        tokio::time::sleep(JOB_WAIT_TICK).await;
    }
}
