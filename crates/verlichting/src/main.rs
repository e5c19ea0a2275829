use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use verlichting::api;
use verlichting::Config;
use verlichting::EntityCategory;
use verlichting::Gateway;
use verlichting::HttpUpstream;
use verlichting::LogLevel;

/// Gateway exposing a whitelisted set of home-automation entities
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "verlichting.toml")]
    config: PathBuf,

    /// Log level, overrides [logging] level from the configuration
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize tracing/logging
    let level = cli.log_level.unwrap_or(config.logging.level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets(level))
        .init();

    tracing::info!("verlichting starting");
    tracing::info!("Loaded config from: {}", cli.config.display());

    let catalog = Arc::new(config.catalog()?);
    for category in [
        EntityCategory::Scenes,
        EntityCategory::Switches,
        EntityCategory::Lights,
        EntityCategory::States,
    ] {
        tracing::info!(
            "Exposing {} {}",
            catalog.allow_list(category).len(),
            category
        );
    }

    let token = config.upstream.resolve_token()?;
    let upstream = HttpUpstream::new(&config.upstream.url, token, config.upstream.timeout())
        .context("Failed to create upstream client")?;
    tracing::info!(
        "Upstream controller: {} (timeout: {}s)",
        upstream.base_url(),
        config.upstream.timeout_secs
    );

    let gateway = Gateway::new(upstream, catalog);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        // Wait for Ctrl+C
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
            }
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        }
        shutdown_tx.send(()).ok();
    });

    api::serve(
        &config.server.listen,
        config.server.port,
        gateway,
        shutdown_rx,
    )
    .await
    .map_err(|e| anyhow::anyhow!("HTTP API server failed: {}", e))?;

    tracing::info!("verlichting shutdown complete");

    Ok(())
}
