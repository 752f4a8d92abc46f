mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use sentinel_core::{Config, ThreatClassifier, TransactionGenerator};
use sentinel_embedding::GeminiEmbedder;
use sentinel_queue::{run_producer, ProducerOptions, RedisStreamStore, TransactionStream};
use sentinel_vector::UpstashCache;
use sentinel_watcher::{spawn_metrics_server, spawn_reporter, PipelineMetrics, Watcher};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    sentinel_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env();
    config.log_summary();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        os_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    match args.command {
        Command::Stream { speed, limit } => stream(&config, speed, limit, shutdown_rx).await,
        Command::Watch => watch_stream(&config, shutdown_rx).await,
    }
}

async fn connect_stream(config: &Config) -> Result<TransactionStream> {
    let store = RedisStreamStore::connect(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;
    Ok(TransactionStream::new(Arc::new(store), &config.redis))
}

async fn stream(config: &Config, speed: u64, limit: u64, shutdown: watch::Receiver<bool>) -> Result<()> {
    let stream = connect_stream(config).await?;
    let generator =
        TransactionGenerator::new(&config.simulation).context("invalid simulation settings")?;
    let options = ProducerOptions {
        speed: Duration::from_millis(speed),
        limit,
    };

    run_producer(&stream, generator, &options, shutdown)
        .await
        .context("producer failed")?;
    Ok(())
}

async fn watch_stream(config: &Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let stream = connect_stream(config).await?;
    let embedder = GeminiEmbedder::from_config(&config.embedding).context("embedding provider")?;
    let cache = UpstashCache::from_config(&config.vector).context("vector index")?;

    let metrics = Arc::new(PipelineMetrics::new());
    let mut background = Vec::new();
    if let Some(port) = config.metrics.port {
        background.push(spawn_metrics_server(port, metrics.clone(), shutdown.clone()));
    }
    if config.metrics.report_interval_secs > 0 {
        background.push(spawn_reporter(
            metrics.clone(),
            Duration::from_secs(config.metrics.report_interval_secs),
            shutdown.clone(),
        ));
    }

    let watcher = Watcher::new(stream, Arc::new(embedder), Arc::new(cache), metrics.clone())
        .with_classifier(ThreatClassifier::new(config.detection.high_risk_threshold))
        .with_top_k(config.vector.top_k);

    let outcome = watcher.run(shutdown).await;

    // A read failure ends the loop without a shutdown signal.
    for handle in background {
        handle.abort();
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                warn!(error = %e, "background task ended abnormally");
            }
        }
    }
    metrics.log_summary();

    outcome.context("stream read failed")?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
