//! Error types for the guaranteed-delivery event pipeline (C5).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Storage(#[from] pos_storage::StorageError),

    #[error("bus publish failed on topic {topic}: {reason}")]
    BusPublish { topic: String, reason: String },

    #[error("delivery status not found for event {event_id}")]
    DeliveryStatusNotFound { event_id: String },

    #[error("unknown subscriber service: {service}")]
    UnknownService { service: String },
}

pub type EventResult<T> = Result<T, EventError>;
