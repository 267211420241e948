//! # Publish Path and Delivery-Status Tracking (C5 §4.5.1 / §4.5.2)
//!
//! A `DeliveryStatus` document is the source of truth for "did every
//! subscriber apply this event". The publisher writes it before touching
//! the bus, so a bus failure never loses the record of what was supposed
//! to be delivered — the republisher (see `republisher.rs`) re-drives the
//! bus call from this document, not from application memory.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use pos_storage::StorageGateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EventError, EventResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Published,
    Delivered,
    PartiallyDelivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeliveryState {
    pub name: String,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    pub event_id: String,
    pub topic: String,
    pub status: OverallStatus,
    pub published_at: DateTime<Utc>,
    pub services: Vec<ServiceDeliveryState>,
    pub payload: Value,
}

/// Publishes a message to `topic`, fire-and-forget from the bus's
/// perspective. A `redis` implementation backs this in production
/// (`RedisBus`); tests use an in-memory recorder.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &Value) -> EventResult<()>;
}

/// `redis` PUBLISH-based bus. Channels map 1:1 to topics; subscribers
/// maintain their own consumer-group bookkeeping outside this crate.
pub struct RedisBus {
    client: redis::Client,
}

impl RedisBus {
    pub fn new(redis_url: &str) -> EventResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| EventError::BusPublish {
            topic: "<connect>".to_string(),
            reason: e.to_string(),
        })?;
        Ok(RedisBus { client })
    }
}

#[async_trait::async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, topic: &str, payload: &Value) -> EventResult<()> {
        use redis::AsyncCommands;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| EventError::BusPublish { topic: topic.to_string(), reason: e.to_string() })?;
        let body = serde_json::to_string(payload).map_err(|e| EventError::BusPublish { topic: topic.to_string(), reason: e.to_string() })?;
        conn.publish::<_, _, i64>(topic, body)
            .await
            .map_err(|e| EventError::BusPublish { topic: topic.to_string(), reason: e.to_string() })?;
        Ok(())
    }
}

pub struct Publisher {
    storage: StorageGateway,
    bus: std::sync::Arc<dyn EventBus>,
}

impl Publisher {
    pub fn new(storage: StorageGateway, bus: std::sync::Arc<dyn EventBus>) -> Self {
        Publisher { storage, bus }
    }

    /// Publishes `payload` on `topic` to `subscribers`, per spec §4.5.1.
    /// Always returns success to the caller once the DeliveryStatus
    /// document is durably written — a bus failure here is swallowed and
    /// left for the republisher, not surfaced as an error.
    pub async fn publish(&self, topic: &str, subscribers: &[&str], payload: Value) -> EventResult<String> {
        let event_id = Uuid::new_v4().to_string();
        let status = DeliveryStatus {
            event_id: event_id.clone(),
            topic: topic.to_string(),
            status: OverallStatus::Published,
            published_at: Utc::now(),
            services: subscribers.iter().map(|s| ServiceDeliveryState { name: s.to_string(), status: ServiceStatus::Pending }).collect(),
            payload: payload.clone(),
        };
        let doc = delivery_status_to_doc(&status)?;
        self.storage.create_commons("delivery_status", doc).await?;

        if let Err(e) = self.bus.publish(topic, &payload).await {
            warn!(event_id = %event_id, topic, error = %e, "bus publish failed, deferring to republisher");
        } else {
            info!(event_id = %event_id, topic, "event published");
        }

        Ok(event_id)
    }

    /// Subscriber callback (spec §4.5.2 step 4): marks `service` delivered
    /// or failed for `event_id` and recomputes the overall status.
    pub async fn report_delivery(&self, event_id: &str, service: &str, delivered: bool) -> EventResult<()> {
        let filter = doc! { "event_id": event_id };
        let raw = self
            .storage
            .commons()
            .collection::<Document>("delivery_status")
            .find_one(filter.clone())
            .await
            .map_err(pos_storage::StorageError::from)?
            .ok_or_else(|| EventError::DeliveryStatusNotFound { event_id: event_id.to_string() })?;

        let mut status = doc_to_delivery_status(raw)?;
        let entry = status
            .services
            .iter_mut()
            .find(|s| s.name == service)
            .ok_or_else(|| EventError::UnknownService { service: service.to_string() })?;
        entry.status = if delivered { ServiceStatus::Delivered } else { ServiceStatus::Failed };
        status.status = recompute_overall(&status.services);

        let update = delivery_status_to_doc(&status)?;
        self.storage
            .commons()
            .collection::<Document>("delivery_status")
            .replace_one(filter, update)
            .await
            .map_err(pos_storage::StorageError::from)?;
        Ok(())
    }
}

/// All delivered → delivered; any failed → partially_delivered; otherwise
/// remains published (spec §4.5.2).
fn recompute_overall(services: &[ServiceDeliveryState]) -> OverallStatus {
    if services.iter().all(|s| s.status == ServiceStatus::Delivered) {
        OverallStatus::Delivered
    } else if services.iter().any(|s| s.status == ServiceStatus::Failed) {
        OverallStatus::PartiallyDelivered
    } else {
        OverallStatus::Published
    }
}

fn delivery_status_to_doc(status: &DeliveryStatus) -> EventResult<Document> {
    bson::to_document(status).map_err(|e| EventError::BusPublish { topic: status.topic.clone(), reason: e.to_string() })
}

fn doc_to_delivery_status(doc: Document) -> EventResult<DeliveryStatus> {
    bson::from_document(doc).map_err(|e| EventError::DeliveryStatusNotFound { event_id: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_is_delivered_only_when_all_services_are() {
        let services = vec![
            ServiceDeliveryState { name: "stock".to_string(), status: ServiceStatus::Delivered },
            ServiceDeliveryState { name: "journal".to_string(), status: ServiceStatus::Delivered },
        ];
        assert_eq!(recompute_overall(&services), OverallStatus::Delivered);
    }

    #[test]
    fn overall_status_is_partially_delivered_when_any_failed() {
        let services = vec![
            ServiceDeliveryState { name: "stock".to_string(), status: ServiceStatus::Delivered },
            ServiceDeliveryState { name: "journal".to_string(), status: ServiceStatus::Failed },
        ];
        assert_eq!(recompute_overall(&services), OverallStatus::PartiallyDelivered);
    }

    #[test]
    fn overall_status_stays_published_while_pending() {
        let services = vec![
            ServiceDeliveryState { name: "stock".to_string(), status: ServiceStatus::Delivered },
            ServiceDeliveryState { name: "journal".to_string(), status: ServiceStatus::Pending },
        ];
        assert_eq!(recompute_overall(&services), OverallStatus::Published);
    }
}
