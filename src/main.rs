//! FraudGuard Scoring Service - Main Entry Point
//!
//! Serves the synchronous prediction API, runs the background stream
//! worker against NATS, and exposes health/metrics surfaces.

use anyhow::Result;
use fraudguard::{
    api,
    cache::{MemoryStore, ResultCache},
    config::AppConfig,
    consumer::TransactionConsumer,
    metrics::MetricsAggregator,
    producer::{AlertProducer, AlertSink},
    service::ScoringService,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    info!("Starting FraudGuard scoring service");

    let metrics = Arc::new(MetricsAggregator::new());

    // Optional event bus wiring
    let mut alert_sink: Option<Arc<dyn AlertSink>> = None;
    let mut consumer = None;
    if config.nats.enabled {
        match async_nats::connect(&config.nats.url).await {
            Ok(client) => {
                info!(url = %config.nats.url, "Connected to NATS");
                alert_sink = Some(Arc::new(AlertProducer::new(
                    client.clone(),
                    &config.nats.alert_subject,
                    config.nats.publish_timeout(),
                )));
                consumer = Some(TransactionConsumer::new(
                    client,
                    &config.nats.transaction_subject,
                ));
            }
            Err(e) => {
                // Best-effort dependency: scoring runs without the bus.
                warn!(error = %e, "NATS unavailable, continuing standalone");
            }
        }
    } else {
        info!("Event bus disabled, running standalone");
    }

    let cache = if config.cache.enabled {
        info!(ttl_secs = config.cache.ttl_secs, "Result cache enabled");
        ResultCache::new(
            Some(Arc::new(MemoryStore::new())),
            config.cache.ttl(),
            metrics.clone(),
        )
    } else {
        info!("Result cache disabled");
        ResultCache::disabled(metrics.clone())
    };

    let service = Arc::new(ScoringService::new(
        config.clone(),
        metrics.clone(),
        cache,
        alert_sink,
    ));

    if let Err(e) = service.load() {
        warn!(error = %e, "Starting degraded: scoring calls will fail until a reload succeeds");
    }

    // Supervised stream worker, joined on shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = match consumer {
        Some(consumer) => match consumer.payloads().await {
            Ok(messages) => Some(tokio::spawn(
                service.clone().run_stream_worker(messages, shutdown_rx),
            )),
            Err(e) => {
                warn!(error = %e, "Stream subscription failed, continuing without worker");
                metrics.record_error();
                None
            }
        },
        None => None,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    let app = api::router(service.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            error!(error = %e, "Stream worker terminated abnormally");
        }
    }

    let snap = metrics.snapshot();
    info!(
        predictions = snap.predictions_total,
        fraud_detected = snap.fraud_detected_total,
        errors = snap.errors_total,
        uptime_seconds = snap.uptime_seconds,
        "Final metrics"
    );

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("fraudguard={}", config.logging.level))
        });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install shutdown handler");
    }
}
