//! # Cart, Transaction Log, and Transaction Status Persistence
//!
//! Thin bson (de)serialization wrappers over `StorageGateway`'s generic
//! document operations (spec §4.1). Kept separate from `engine.rs` so the
//! pricing/state-machine orchestration in that module reads without
//! storage-shape noise.

use bson::doc;
use pos_core::{Cart, TransactionLog, TransactionStatus};
use pos_storage::{StorageError, StorageGateway};

use crate::error::{CartError, CartResult};

pub async fn load_cart(storage: &StorageGateway, cart_id: &str) -> CartResult<Cart> {
    let raw = storage
        .get("carts", doc! { "cart_id": cart_id })
        .await?
        .ok_or_else(|| CartError::CartNotFound { cart_id: cart_id.to_string() })?;
    Ok(bson::from_document(raw).map_err(|e| StorageError::Internal(e.to_string()))?)
}

pub async fn save_cart(storage: &StorageGateway, cart: &Cart) -> CartResult<()> {
    let doc = bson::to_document(cart).map_err(|e| StorageError::Internal(e.to_string()))?;
    let filter = doc! { "cart_id": &cart.cart_id };
    if !storage.replace("carts", filter, doc.clone()).await? {
        storage.create("carts", doc).await?;
    }
    Ok(())
}

pub async fn insert_transaction_log(storage: &StorageGateway, log: &TransactionLog) -> CartResult<()> {
    let doc = bson::to_document(log).map_err(|e| StorageError::Internal(e.to_string()))?;
    storage.create("transaction_logs", doc).await?;
    Ok(())
}

pub async fn load_transaction_log(storage: &StorageGateway, terminal_id: &str, transaction_no: i64) -> CartResult<TransactionLog> {
    let raw = storage
        .get("transaction_logs", doc! { "terminal_id": terminal_id, "transaction_no": transaction_no })
        .await?
        .ok_or(CartError::TransactionNotFound { transaction_no })?;
    Ok(bson::from_document(raw).map_err(|e| StorageError::Internal(e.to_string()))?)
}

pub async fn load_transaction_status(
    storage: &StorageGateway,
    terminal_id: &str,
    transaction_no: i64,
) -> CartResult<Option<TransactionStatus>> {
    let raw = storage.get("transaction_status", doc! { "terminal_id": terminal_id, "transaction_no": transaction_no }).await?;
    match raw {
        Some(d) => Ok(Some(bson::from_document(d).map_err(|e| StorageError::Internal(e.to_string()))?)),
        None => Ok(None),
    }
}

/// Creates the status document lazily on first void/return, or replaces
/// it in place on a second mutation (e.g. voiding a return) — the spec's
/// "never deletes the original log" applies to `transaction_logs`, not to
/// this out-of-band overlay (spec §3 `TransactionStatus`).
pub async fn upsert_transaction_status(
    storage: &StorageGateway,
    terminal_id: &str,
    transaction_no: i64,
    status: &TransactionStatus,
) -> CartResult<()> {
    let filter = doc! { "terminal_id": terminal_id, "transaction_no": transaction_no };
    let mut doc = bson::to_document(status).map_err(|e| StorageError::Internal(e.to_string()))?;
    doc.insert("terminal_id", terminal_id);
    doc.insert("transaction_no", transaction_no);
    if !storage.replace("transaction_status", filter, doc.clone()).await? {
        storage.create("transaction_status", doc).await?;
    }
    Ok(())
}

/// Overlays a transaction log's `is_voided`/`is_refunded` flags with the
/// out-of-band status document, for readers — the log itself is never
/// mutated (spec §4.4.6: "the reader must join against the status
/// collection").
pub async fn read_with_status_overlay(storage: &StorageGateway, terminal_id: &str, transaction_no: i64) -> CartResult<TransactionLog> {
    let mut log = load_transaction_log(storage, terminal_id, transaction_no).await?;
    if let Some(status) = load_transaction_status(storage, terminal_id, transaction_no).await? {
        log.is_voided = status.is_voided;
        log.is_refunded = status.is_refunded;
    }
    Ok(log)
}
