//! pairlink daemon.
//!
//! Accepts connections from paired devices and runs their commands against
//! the local peripheral list.
//!
//!   pairlink-daemon --config pairlink.toml
//!   pairlink-daemon --listen 127.0.0.1:7878

use anyhow::Context;
use clap::Parser;
use pairlink_client::{Handlers, LogNotifier, MemoryPeripheralStore, serve};
use pairlink_daemon::{Config, init_tracing};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "pairlink-daemon", version, about = "Accept pairlink commands from paired devices")]
struct Args {
    /// Path to the TOML config.
    #[arg(long, env = "PAIRLINK_CONFIG")]
    config: Option<PathBuf>,
    /// Override the listen address from the config.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("pairlink=info")?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    let addr = args.listen.unwrap_or(config.listen);

    let store = Arc::new(MemoryPeripheralStore::new(config.peripherals.clone()));
    tracing::info!("Starting with {} peripheral(s)", store.len());
    let handlers = Handlers::new(store, Arc::new(LogNotifier));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        result = serve(listener, handlers, config.client_config().transport) => {
            result.context("accept loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
