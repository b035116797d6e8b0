//! ocsrelay binary entry point.
//!
//! Usage:
//! ```bash
//! ocsrelay --config ocsrelay.toml
//! ```

use anyhow::Context;
use ocsrelay_service::config::Config;
use ocsrelay_service::relay::Relay;
use ocsrelay_service::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = config_path_from_args();
    let config = Config::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    tracing::info!(
        accounts = config.accounts.len(),
        packages = config.auth.allowed_packages.len(),
        "ocsrelay v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let relay = Arc::new(Relay::from_config(&config));

    tokio::select! {
        result = server::run(relay, &config) => {
            result.context("relay server terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

fn config_path_from_args() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ocsrelay.toml"))
}
