//! Shared pieces of the `pairlink-daemon` and `pairlink` binaries.

pub mod config;

pub use config::{Config, ConfigError};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. When `RUST_LOG` is set it replaces
/// `default_directive` entirely.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(env.as_deref(), default_directive)?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// `env` when it parses, `default_directive` otherwise.
fn env_filter(
    env: Option<&str>,
    default_directive: &str,
) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match env.map(EnvFilter::try_new) {
        Some(Ok(filter)) => Ok(filter),
        _ => EnvFilter::try_new(default_directive),
    }
}
