//! pairlink CLI.
//!
//! Sends one command to a paired device and reports the outcome.
//!
//!   pairlink --config pairlink.toml notify --device desk --title Hi --body there
//!   pairlink sync --addr 192.168.1.20:7878 --file peripherals.json
//!   pairlink connect-all --device desk

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use pairlink_client::{Client, ExchangeOutcome};
use pairlink_core::{Device, PeripheralSyncPayload};
use pairlink_daemon::{Config, init_tracing};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pairlink", version, about = "Send commands to a paired device")]
struct Cli {
    /// Path to the TOML config.
    #[arg(long, env = "PAIRLINK_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show a notification on the device.
    Notify {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    /// Replace the device's peripheral list.
    Sync {
        #[command(flatten)]
        target: Target,
        /// JSON array of peripherals. Defaults to the config's list.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Connect every peripheral on the device.
    ConnectAll {
        #[command(flatten)]
        target: Target,
    },
    /// Unregister every peripheral on the device.
    UnregisterAll {
        #[command(flatten)]
        target: Target,
    },
    /// List configured devices.
    Devices,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Device name from the config.
    #[arg(long)]
    device: Option<String>,
    /// Device address as `host:port` or `name@host:port`.
    #[arg(long)]
    addr: Option<Device>,
}

impl Target {
    fn resolve(&self, config: &Config) -> anyhow::Result<Device> {
        match (&self.device, &self.addr) {
            (Some(name), _) => Ok(config.device(name)?),
            (None, Some(device)) => Ok(device.clone()),
            (None, None) => bail!("either --device or --addr is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("pairlink=warn")?;

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    let client = Client::new(config.client_config());

    let (device, result) = match &cli.command {
        Command::Devices => {
            for device in &config.devices {
                println!("{}\t{}", device.name, device.address());
            }
            return Ok(());
        }
        Command::Notify {
            target,
            title,
            body,
        } => {
            let device = target.resolve(&config)?;
            let result = client.send_notification(&device, title, body).await;
            (device, result)
        }
        Command::Sync { target, file } => {
            let device = target.resolve(&config)?;
            let peripherals = match file {
                Some(path) => {
                    let text = std::fs::read_to_string(path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    PeripheralSyncPayload::decode(&text)
                        .with_context(|| format!("invalid peripheral list in {}", path.display()))?
                        .peripherals
                }
                None => config.peripherals.clone(),
            };
            let result = client.sync_peripherals(&device, &peripherals).await;
            (device, result)
        }
        Command::ConnectAll { target } => {
            let device = target.resolve(&config)?;
            let result = client.connect_all(&device).await;
            (device, result)
        }
        Command::UnregisterAll { target } => {
            let device = target.resolve(&config)?;
            let result = client.unregister_all(&device).await;
            (device, result)
        }
    };

    match result {
        Ok(ExchangeOutcome::Delivered) => println!("{}: delivered", device.name),
        Ok(ExchangeOutcome::Succeeded) => println!("{}: ok", device.name),
        Ok(ExchangeOutcome::Failed) => bail!("{} reported the operation failed", device.name),
        Err(e) => return Err(e).with_context(|| format!("{} failed", device)),
    }

    Ok(())
}
