use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use cmq_client::CmqClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use cmqbeat::health;
use cmqbeat::poller::Poller;
use cmqbeat::publisher;
use cmqbeat::types::{BeatConfig, Environment};

#[derive(Parser)]
#[command(name = "cmqbeat", about = "Forwards CMQ queue messages to an event pipeline")]
struct Args {
    /// Path of the TOML config file
    #[arg(long, env = "CMQBEAT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // JSON logs for staging/production, regular format for development
    if environment.json_logs() {
        fmt().json().with_env_filter(env_filter).init();
    } else {
        fmt().with_env_filter(env_filter).init();
    }

    let args = Args::parse();
    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from(environment.default_config_path()));

    let config = BeatConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!(
        "Starting cmqbeat in {:?} environment, queue: {}, period: {:?}",
        environment,
        config.cmq.queue_name,
        config.period()
    );

    let queue = Arc::new(CmqClient::new(config.queue_config()).context("Failed to create CMQ client")?);
    let publisher = publisher::from_config(&config.output)?;

    // Single shutdown token for everything
    let shutdown_token = CancellationToken::new();

    if let Some(port) = config.health_port {
        let health_shutdown = shutdown_token.clone();
        tokio::spawn(async move {
            if let Err(e) = health::start_health_server(port, health_shutdown).await {
                error!("Health server error: {}", e);
            }
        });
    }

    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, stopping after the current cycle...");
        signal_shutdown.cancel();
    });

    let summary = Poller::new(
        queue,
        publisher,
        config.name.clone(),
        config.period(),
        shutdown_token,
    )
    .run()
    .await;

    info!("cmqbeat stopped after {} cycles", summary.cycles);
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
