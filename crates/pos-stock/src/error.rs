//! Error types for the stock ledger, snapshot scheduler, and alert channel (C6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockError {
    #[error(transparent)]
    Storage(#[from] pos_storage::StorageError),

    #[error("unrecognized transaction type for stock processing: {code}")]
    UnrecognizedTransactionType { code: i32 },

    #[error("unknown snapshot target store: {store_code}")]
    UnknownStore { store_code: String },
}

pub type StockResult<T> = Result<T, StockError>;
