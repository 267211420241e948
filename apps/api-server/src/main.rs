//! # pos-api-server
//!
//! HTTP surface over the Cart Engine (C4), Event-Delivery Pipeline (C5),
//! and Stock Ledger (C6) — the multi-tenant POS backend's externally
//! reachable process. Connects once to MongoDB, lazily builds a
//! per-tenant bundle on first request (`AppState::tenant`), and runs two
//! background loops alongside the HTTP listener: the event republisher
//! (C5 §4.5.3) and the stock snapshot scheduler (C6 §4.6.3).

mod accounts;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod notifier;
mod routes;
mod state;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use pos_events::{Republisher, RepublisherConfig};
use pos_storage::StorageGateway;
use pos_stock::{ScheduleFrequency, SnapshotGate, SnapshotSchedule};
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::ApiConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).with_target(true).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting pos-api-server");

    let config = ApiConfig::load()?;
    info!(bind_addr = %config.bind_addr, db_name_prefix = %config.db_name_prefix, "configuration loaded");

    let root_storage = StorageGateway::connect(&config.mongodb_uri, &config.db_name_prefix, "commons").await?;
    root_storage.register_commons().await?;
    info!("connected to MongoDB, commons namespace registered");

    let master_data_base_url = std::env::var("MASTER_DATA_BASE_URL").unwrap_or_else(|_| "http://localhost:8001".to_string());
    let state = Arc::new(AppState::new(config.clone(), root_storage.clone(), &master_data_base_url).await?);

    let (republisher, republisher_handle) = Republisher::new(
        root_storage.clone(),
        state.bus(),
        RepublisherConfig::default(),
    );
    let republisher_task = tokio::spawn(republisher.run());

    let (snapshot_shutdown_tx, snapshot_shutdown_rx) = mpsc::channel::<()>(1);
    let snapshot_task = tokio::spawn(run_snapshot_scheduler(root_storage.clone(), config.clone(), snapshot_shutdown_rx));

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("http listener stopped, shutting down background tasks");
    republisher_handle.shutdown().await;
    let _ = snapshot_shutdown_tx.send(()).await;
    let _ = republisher_task.await;
    let _ = snapshot_task.await;

    info!("shutdown complete");
    Ok(())
}

/// Drives the hourly snapshot sweep for every tenant with a configured
/// schedule (spec §4.6.3). The schedule list itself is not yet
/// tenant-editable storage-backed state — each tenant currently gets a
/// single daily midnight snapshot of all its stores, matching the
/// process-wide default `SnapshotSchedule`; a per-tenant override store
/// is a natural extension once a tenant-administration surface exists.
async fn run_snapshot_scheduler(root_storage: StorageGateway, config: ApiConfig, mut shutdown_rx: mpsc::Receiver<()>) {
    let gate = SnapshotGate::new();
    let mut interval = tokio::time::interval(Duration::from_secs(3600));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let tenants = known_tenant_ids(&root_storage).await;
                for tenant_id in tenants {
                    let storage = root_storage.for_tenant(&tenant_id);
                    let schedule = SnapshotSchedule {
                        tenant_id: tenant_id.clone(),
                        frequency: ScheduleFrequency::Daily,
                        hour: 0,
                        minute: 0,
                        stores: vec!["all".to_string()],
                        retention_days: 90,
                    };
                    if let Err(e) = pos_stock::run_scheduled_snapshot(&storage, &gate, &schedule).await {
                        error!(tenant_id = %tenant_id, error = %e, "scheduled snapshot failed");
                    }
                }
                let _ = &config;
            }
            _ = shutdown_rx.recv() => {
                info!("snapshot scheduler shutting down");
                break;
            }
        }
    }
}

/// Enumerates tenants with at least one registered terminal — the
/// snapshot scheduler has no separate tenant directory, so it piggybacks
/// on whichever tenants have already been provisioned via the admin CLI
/// or the terminal-creation endpoint.
async fn known_tenant_ids(root_storage: &StorageGateway) -> Vec<String> {
    use futures_util::stream::TryStreamExt;
    let mut cursor = match root_storage.commons().collection::<bson::Document>("accounts").find(bson::doc! {}).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to list accounts for snapshot scheduling");
            return Vec::new();
        }
    };
    let mut tenants = std::collections::HashSet::new();
    while let Ok(Some(doc)) = cursor.try_next().await {
        if let Ok(tenant_id) = doc.get_str("tenant_id") {
            tenants.insert(tenant_id.to_string());
        }
    }
    tenants.into_iter().collect()
}

/// Graceful shutdown on SIGINT/SIGTERM, adapted from the teacher's
/// cloud-api process shutdown handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
