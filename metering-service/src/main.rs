use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tracing::{info, warn};

use metering_service::{
    api,
    config::AppConfig,
    engine::Engine,
    metrics_server, observability,
    pipeline::Source,
    sinks::{self, PgSnapshotStore, SnapshotStore},
    sources::{HttpMeasurementSource, TickSource},
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.store.max_connections)
        .connect(&cfg.store.uri)
        .await?;
    let store: Arc<PgSnapshotStore> = Arc::new(PgSnapshotStore::new(pool));
    store.ensure_schema().await?;

    // Restore: merge persisted snapshots with the configured meters. No
    // boundary is recomputed here; the first tick below catches anything
    // crossed while the process was down.
    let snapshots = store.load_all().await?;
    let meters: Vec<meter_core::Meter> = cfg
        .meters
        .iter()
        .cloned()
        .map(|meter_cfg| meter_core::restore::reconcile(meter_cfg, &snapshots))
        .collect();
    info!(
        meters = meters.len(),
        snapshots = snapshots.len(),
        "meters restored from persisted state"
    );

    let (persist_tx, persist_rx) = mpsc::channel(cfg.store.queue_capacity);
    tokio::spawn(sinks::run_persister(
        store.clone() as Arc<dyn SnapshotStore>,
        persist_rx,
        cfg.store.max_retries,
        Duration::from_millis(cfg.store.retry_backoff_ms),
    ));

    let engine = Arc::new(Engine::start(meters, persist_tx, cfg.source.channel_capacity));

    // Command surface.
    let api_addr: SocketAddr = cfg
        .api
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid api.bind_addr: {e}"))?;
    let api_router = api::router(engine.clone());
    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(api_listener, api_router.into_make_service()).await {
            tracing::error!(error = %e, "command api server error");
        }
    });

    let measurement_source =
        HttpMeasurementSource::new(&cfg.source.http_bind_addr, cfg.source.channel_capacity).await?;
    let tick_source = TickSource::new(Duration::from_secs(cfg.scheduler.tick_interval_secs));

    let mut measurements = measurement_source.stream().await;
    let mut ticks = tick_source.stream().await;

    info!("metering engine started");

    let sig = tokio::signal::ctrl_c();
    tokio::pin!(sig);
    loop {
        tokio::select! {
            biased;
            _ = &mut sig => {
                info!("shutdown requested");
                break;
            }
            Some(item) = ticks.next() => {
                match item {
                    Ok(env) => engine.broadcast_tick(env.payload).await,
                    Err(e) => warn!(error = %e, "tick source error"),
                }
            }
            Some(item) = measurements.next() => {
                match item {
                    Ok(env) => engine.dispatch_measurement(env.payload).await,
                    Err(e) => warn!(error = %e, "measurement source error"),
                }
            }
            else => break,
        }
    }

    Ok(())
}
