//! # Republisher (C5 §4.5.3)
//!
//! A scheduled job, one per publisher instance, that re-drives the bus
//! call for any `DeliveryStatus` still short of `delivered` within its
//! tenant-configured window. Modeled on the same poll-loop/shutdown-channel
//! shape used elsewhere in this codebase for background sync processors:
//! a `tokio::time::interval` tick races a shutdown signal inside
//! `tokio::select!`, and a `RepublisherHandle` lets the owning process ask
//! it to stop during graceful shutdown.

use std::time::Duration;

use bson::{doc, Document};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::delivery::{DeliveryStatus, EventBus, OverallStatus};
use crate::error::EventResult;
use pos_storage::StorageGateway;

pub struct RepublisherConfig {
    pub interval: Duration,
    pub window: Duration,
}

impl Default for RepublisherConfig {
    fn default() -> Self {
        RepublisherConfig { interval: Duration::from_secs(120), window: Duration::from_secs(3600) }
    }
}

pub struct Republisher {
    storage: StorageGateway,
    bus: std::sync::Arc<dyn EventBus>,
    config: RepublisherConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

#[derive(Clone)]
pub struct RepublisherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl RepublisherHandle {
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl Republisher {
    pub fn new(storage: StorageGateway, bus: std::sync::Arc<dyn EventBus>, config: RepublisherConfig) -> (Self, RepublisherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (Republisher { storage, bus, config, shutdown_rx }, RepublisherHandle { shutdown_tx })
    }

    /// Runs the republisher loop. Spawn this as a background task; it
    /// returns only after `shutdown()` is called on its handle.
    pub async fn run(mut self) {
        info!("republisher starting");
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "republisher sweep failed");
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("republisher shutting down");
                    break;
                }
            }
        }
    }

    async fn sweep(&self) -> EventResult<()> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.window).unwrap_or(chrono::Duration::hours(1));
        let filter = doc! {
            "published_at": { "$gt": cutoff },
            "status": { "$ne": "delivered" },
        };
        let mut cursor = self.storage.commons().collection::<Document>("delivery_status").find(filter).await.map_err(pos_storage::StorageError::from)?;

        use futures_util::stream::TryStreamExt;
        let mut republished = 0usize;
        while let Some(raw) = cursor.try_next().await.map_err(pos_storage::StorageError::from)? {
            let status: DeliveryStatus = match bson::from_document(raw) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "skipping malformed delivery_status document");
                    continue;
                }
            };
            if status.status == OverallStatus::Delivered {
                continue;
            }
            if let Err(e) = self.bus.publish(&status.topic, &status.payload).await {
                error!(event_id = %status.event_id, error = %e, "republish attempt failed");
                continue;
            }
            republished += 1;
            debug!(event_id = %status.event_id, "republished event");
        }

        if republished > 0 {
            info!(count = republished, "republisher swept overdue deliveries");
        }
        Ok(())
    }
}
