//! # Error Types
//!
//! Domain errors for the pure cart-math layer. These are the innermost
//! layer of the error chain: `ValidationError`/`CoreError` (here) →
//! `StorageError` (pos-storage) → `CartError`/`StockError`/`EventError`
//! (the I/O-bearing crates) → `ApiError` (apps/api-server).

use thiserror::Error;

/// Business-rule violations in the pricing pipeline and state machine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("event {event:?} is not valid in state {state:?}")]
    InvalidEvent { state: String, event: String },

    #[error("line {line_no} is discount-restricted")]
    DiscountRestricted { line_no: u32 },

    #[error("discount amount {amount} exceeds line amount {line_amount}")]
    DiscountExceedsAmount { amount: i64, line_amount: i64 },

    #[error("discount percentage {value} out of range [0,100]")]
    DiscountPercentageOutOfRange { value: i64 },

    #[error("subtotal discount amount {amount} exceeds balance {balance}")]
    SubtotalDiscountExceedsBalance { amount: i64, balance: i64 },

    #[error("discount allocation for {discount_amount} across lines summing {line_total} did not converge")]
    AllocationFailed { discount_amount: i64, line_total: i64 },

    #[error("payment code '{0}' is unknown")]
    UnknownPaymentCode(String),

    #[error("deposit {deposit} exceeds balance {balance} for a method that forbids over-deposit")]
    DepositOver { deposit: i64, balance: i64 },

    #[error("balance would go negative: balance {balance}, payment {amount}")]
    BalanceWouldGoNegative { balance: i64, amount: i64 },

    #[error("cannot add a payment when balance is already zero")]
    BalanceAlreadyZero,

    #[error("cart is not in Paying state, cannot finalize")]
    NotReadyToFinalize,

    #[error("transaction {0} is already voided")]
    AlreadyVoided(i64),

    #[error("transaction {0} is already refunded")]
    AlreadyRefunded(i64),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Input validation failures, surfaced as 4xx with `userError` populated.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_event_message() {
        let err = CoreError::InvalidEvent {
            state: "Completed".into(),
            event: "add_payment".into(),
        };
        assert!(err.to_string().contains("add_payment"));
    }

    #[test]
    fn validation_converts_into_core_error() {
        let v = ValidationError::Required { field: "sku".into() };
        let core: CoreError = v.into();
        assert!(matches!(core, CoreError::Validation(_)));
    }
}
