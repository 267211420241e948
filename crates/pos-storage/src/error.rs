//! # Storage Error Types
//!
//! Error types for the tenant-scoped storage gateway (C1).
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  mongodb::error::Error                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StorageError (this module) ← Adds collection + key context            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartError / StockError / EventError (callers wrap/convert)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (in apps/api-server) ← Serialized into ApiResponse            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Storage gateway operation errors. Each variant carries the collection
/// name and the key that triggered it, mirroring the shape of the
/// teacher's `DbError`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{collection} not found: {key}")]
    NotFound { collection: String, key: String },

    #[error("{collection} already exists: {key}")]
    AlreadyExists { collection: String, key: String },

    #[error("update to {collection} matched no document: {key}")]
    UpdateMiss { collection: String, key: String },

    #[error("delete from {collection} matched no document: {key}")]
    DeleteMiss { collection: String, key: String },

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        StorageError::NotFound { collection: collection.into(), key: key.into() }
    }

    pub fn update_miss(collection: impl Into<String>, key: impl Into<String>) -> Self {
        StorageError::UpdateMiss { collection: collection.into(), key: key.into() }
    }

    pub fn delete_miss(collection: impl Into<String>, key: impl Into<String>) -> Self {
        StorageError::DeleteMiss { collection: collection.into(), key: key.into() }
    }
}

/// Converts driver errors to `StorageError`. Network/selection-server
/// errors map to `Connection`; everything else lands in `Internal` and is
/// logged with its original message for debugging.
impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match *err.kind {
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => StorageError::Connection(err.to_string()),
            ErrorKind::Transaction { .. } => StorageError::TransactionAborted(err.to_string()),
            _ => StorageError::Internal(err.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
