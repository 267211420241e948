//! # Terminal Persistence
//!
//! Thin bson (de)serialization wrappers over `StorageGateway`'s generic
//! document operations (spec §4.1), mirroring `pos-cart::repository`'s
//! shape for `Cart`/`TransactionLog`.

use bson::doc;
use pos_storage::{StorageError, StorageGateway};

use crate::entities::Terminal;
use crate::error::{TerminalError, TerminalResult};

pub async fn load_terminal(storage: &StorageGateway, store_code: &str, terminal_no: i32) -> TerminalResult<Terminal> {
    let raw = storage
        .get("terminals", doc! { "store_code": store_code, "terminal_no": terminal_no })
        .await?
        .ok_or_else(|| TerminalError::TerminalNotFound {
            terminal_id: format!("{store_code}-{terminal_no}"),
        })?;
    Ok(bson::from_document(raw).map_err(|e| StorageError::Internal(e.to_string()))?)
}

pub async fn load_terminal_by_id(storage: &StorageGateway, terminal_id: &str) -> TerminalResult<Terminal> {
    let raw = storage
        .get("terminals", doc! { "terminal_id": terminal_id })
        .await?
        .ok_or_else(|| TerminalError::TerminalNotFound { terminal_id: terminal_id.to_string() })?;
    Ok(bson::from_document(raw).map_err(|e| StorageError::Internal(e.to_string()))?)
}

pub async fn save_terminal(storage: &StorageGateway, terminal: &Terminal) -> TerminalResult<()> {
    let mut doc = bson::to_document(terminal).map_err(|e| StorageError::Internal(e.to_string()))?;
    doc.insert("terminal_id", terminal.terminal_id());
    let filter = doc! { "store_code": &terminal.store_code, "terminal_no": terminal.terminal_no };
    if !storage.replace("terminals", filter, doc.clone()).await? {
        storage.create("terminals", doc).await?;
    }
    Ok(())
}

pub async fn delete_terminal(storage: &StorageGateway, store_code: &str, terminal_no: i32) -> TerminalResult<bool> {
    Ok(storage.delete("terminals", doc! { "store_code": store_code, "terminal_no": terminal_no }).await?)
}

pub async fn list_terminals(storage: &StorageGateway, store_code: &str) -> TerminalResult<Vec<Terminal>> {
    let (docs, _total) = storage.list("terminals", doc! { "store_code": store_code }, 500, 0, None).await?;
    docs.into_iter()
        .map(|d| bson::from_document(d).map_err(|e| TerminalError::Storage(StorageError::Internal(e.to_string()))))
        .collect()
}
