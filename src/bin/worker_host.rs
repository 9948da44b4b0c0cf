//! Headless worker bridge binary for stdin/stdout JSON communication.
//!
//! Usage: `upkeep-worker [CONFIG_PATH]`. Without a path the default config
//! location is used; a missing file means built-in defaults.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use std::path::PathBuf;
use upkeep::config::WorkerConfig;
use upkeep::host::run_stdio_bridge;

fn load_config() -> anyhow::Result<WorkerConfig> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(WorkerConfig::default_config_path);

    let config = match path {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "loading worker config");
            WorkerConfig::from_file(&path)
                .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?
        }
        Some(path) => {
            tracing::info!(path = %path.display(), "config file not found; using defaults");
            WorkerConfig::default()
        }
        None => WorkerConfig::default(),
    };

    let config = config.resolved();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid worker config: {e}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(cache = %config.cache.version, "upkeep-worker starting");

    run_stdio_bridge(config).await.map_err(|e| {
        tracing::error!(error = %e, "upkeep-worker exited with error");
        anyhow::anyhow!("upkeep-worker failed: {e}")
    })?;

    tracing::info!("upkeep-worker shut down cleanly");
    Ok(())
}
