//! # Cart Mutation Lock (spec §5 "Cart concurrency")
//!
//! Mutations on a single cart are serialized by a lock on `cart_id`;
//! mutations on different carts proceed in parallel. The spec allows an
//! in-process lock when only one instance exists, or a short-lived lease
//! in a shared store otherwise. This module provides both behind one
//! trait so `CartEngine` does not change when moving from a single
//! instance to a fleet: [`InProcessCartLocks`] for the former,
//! [`LeaseCartLocks`] (built on the storage gateway's `create`/`delete`,
//! the same primitive the terminal counter service's fallback CAS path
//! uses) for the latter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bson::doc;
use pos_storage::{StorageError, StorageGateway};
use tokio::sync::OwnedMutexGuard;

use crate::error::CartResult;

/// A held lock on one `cart_id`. Dropping it releases the lock.
pub enum CartLockGuard {
    InProcess(OwnedMutexGuard<()>),
    Lease { storage: StorageGateway, cart_id: String },
}

impl Drop for CartLockGuard {
    fn drop(&mut self) {
        if let CartLockGuard::Lease { storage, cart_id } = self {
            let storage = storage.clone();
            let cart_id = cart_id.clone();
            // Best-effort release: a lease that outlives its holder still
            // expires on its own via the collection's TTL index, so a
            // failed delete here is not a correctness problem, only a
            // delay until the lease's TTL catches up.
            tokio::spawn(async move {
                let _ = storage.delete("cart_locks", doc! { "cart_id": cart_id }).await;
            });
        }
    }
}

#[async_trait]
pub trait CartLocks: Send + Sync {
    async fn acquire(&self, cart_id: &str) -> CartResult<CartLockGuard>;
}

/// Single-instance lock: a per-`cart_id` `tokio::Mutex`, created lazily
/// and kept in a process-wide map. Sufficient only when exactly one
/// `pos-cart` instance is running (spec §5).
#[derive(Default)]
pub struct InProcessCartLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InProcessCartLocks {
    pub fn new() -> Self {
        InProcessCartLocks::default()
    }

    fn mutex_for(&self, cart_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(cart_id.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }
}

#[async_trait]
impl CartLocks for InProcessCartLocks {
    async fn acquire(&self, cart_id: &str) -> CartResult<CartLockGuard> {
        let mutex = self.mutex_for(cart_id);
        let guard = mutex.lock_owned().await;
        Ok(CartLockGuard::InProcess(guard))
    }
}

/// Distributed lease: a short-lived document in the `cart_locks`
/// collection, claimed by a unique-index insert the same way the event
/// pipeline's subscriber dedupe claims an `event_id` (see
/// `pos_events::dedupe::claim_once`). Used when more than one `pos-cart`
/// instance shares a tenant's traffic.
pub struct LeaseCartLocks {
    storage: StorageGateway,
    lease_ttl: Duration,
    retry_delay: Duration,
    max_attempts: u32,
}

impl LeaseCartLocks {
    pub fn new(storage: StorageGateway, lease_ttl: Duration) -> Self {
        LeaseCartLocks { storage, lease_ttl, retry_delay: Duration::from_millis(50), max_attempts: 40 }
    }
}

#[async_trait]
impl CartLocks for LeaseCartLocks {
    async fn acquire(&self, cart_id: &str) -> CartResult<CartLockGuard> {
        let lease_doc = doc! {
            "_id": cart_id,
            "cart_id": cart_id,
            "leased_at": chrono::Utc::now(),
        };

        for attempt in 0..self.max_attempts {
            match self.storage.create("cart_locks", lease_doc.clone()).await {
                Ok(_) => {
                    return Ok(CartLockGuard::Lease { storage: self.storage.clone(), cart_id: cart_id.to_string() });
                }
                Err(StorageError::AlreadyExists { .. }) => {
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let _ = self.lease_ttl; // enforced by the collection's TTL index, declared alongside `cart_locks` in pos-storage::collections
        tracing::warn!(cart_id, attempts = self.max_attempts, "exhausted cart lock acquisition attempts");
        Err(crate::error::CartError::CartNotFound { cart_id: cart_id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_lock_serializes_same_cart() {
        let locks = Arc::new(InProcessCartLocks::new());
        let guard1 = locks.acquire("c1").await.unwrap();

        let locks2 = locks.clone();
        let handle = tokio::spawn(async move {
            let _guard2 = locks2.acquire("c1").await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(guard1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn in_process_lock_allows_different_carts_concurrently() {
        let locks = Arc::new(InProcessCartLocks::new());
        let _guard1 = locks.acquire("c1").await.unwrap();
        let guard2 = locks.acquire("c2").await.unwrap();
        drop(guard2);
    }
}
