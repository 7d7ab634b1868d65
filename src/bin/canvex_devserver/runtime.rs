use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use super::routes::{API_PREFIX, app_router};
use super::*;

#[derive(Parser)]
#[command(name = "canvex-devserver")]
#[command(about = "In-memory scene, chat and media-job server (development)", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Write bound address to this file (dev/test convenience)
    #[arg(long)]
    addr_file: Option<PathBuf>,

    /// Require this bearer token on API routes
    #[arg(long)]
    token: Option<String>,
}

pub(super) async fn run() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_env("CANVEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = Arc::new(AppState::new(args.token.clone()));
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    let local_addr = listener.local_addr().context("read listener local addr")?;
    tracing::info!(addr = %local_addr, prefix = API_PREFIX, "canvex-devserver listening");

    if let Some(addr_file) = &args.addr_file {
        std::fs::write(addr_file, local_addr.to_string())
            .with_context(|| format!("write addr file {}", addr_file.display()))?;
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
