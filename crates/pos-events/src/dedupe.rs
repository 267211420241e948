//! # Subscriber Dedupe (C5 §4.5.2 step 2)
//!
//! Each subscriber claims an `event_id` exactly once before acting on it.
//! The spec frames this as `SET IF NOT EXISTS` against a key-value store;
//! this crate expresses the same primitive against the shared `commons`
//! database's unique index on `subscriber_dedupe.event_id` — an insert
//! that hits the unique index is the not-exists branch, and a duplicate-key
//! error is the already-claimed branch.

use bson::doc;
use chrono::Utc;
use pos_storage::{StorageError, StorageGateway};

use crate::error::EventResult;

/// Attempts to claim `event_id` for `service`. Returns `true` if this call
/// made the claim (the subscriber should process the event), `false` if
/// another call already claimed it (the subscriber should no-op and still
/// report success, per spec).
pub async fn claim_once(storage: &StorageGateway, service: &str, event_id: &str) -> EventResult<bool> {
    let key = format!("{service}:{event_id}");
    let doc = doc! {
        "_id": key,
        "event_id": event_id,
        "service": service,
        "claimed_at": Utc::now(),
    };
    match storage.create_commons("subscriber_dedupe", doc).await {
        Ok(_) => Ok(true),
        Err(StorageError::AlreadyExists { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    // `claim_once` is exercised against a live commons database in the
    // integration suite (requires MongoDB); its unique-index semantics
    // aren't meaningfully testable without one.
}
