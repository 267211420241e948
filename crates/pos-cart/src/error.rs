//! Error types for the I/O-bearing half of the cart engine (C4).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Core(#[from] pos_core::CoreError),

    #[error(transparent)]
    Storage(#[from] pos_storage::StorageError),

    #[error(transparent)]
    Terminal(#[from] pos_terminal::TerminalError),

    #[error(transparent)]
    Event(#[from] pos_events::EventError),

    #[error("cart not found: {cart_id}")]
    CartNotFound { cart_id: String },

    #[error("unknown payment code: {payment_code}")]
    UnknownPaymentMethod { payment_code: String },

    #[error("balance must be at least 1 to accept a payment, got {balance}")]
    NothingToPay { balance: i64 },

    #[error("deposit {deposit} exceeds balance {balance} and this payment method disallows over-deposit")]
    OverDepositNotAllowed { deposit: i64, balance: i64 },

    #[error("transaction {transaction_no} not found")]
    TransactionNotFound { transaction_no: i64 },

    #[error("transaction {transaction_no} is already voided")]
    AlreadyVoided { transaction_no: i64 },

    #[error("transaction {transaction_no} is already refunded")]
    AlreadyRefunded { transaction_no: i64 },

    #[error("cart {cart_id} cannot finalize with a non-zero balance of {balance}")]
    NotReadyToFinalize { cart_id: String, balance: i64 },
}

pub type CartResult<T> = Result<T, CartError>;
