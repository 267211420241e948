//! `ApiError` wraps every lower-layer error into the HTTP surface, and
//! `ApiResponse` is the response envelope spec §6 and §7 require for every
//! endpoint: `{success, code, message, data, metadata?, userError, operation}`.
//!
//! The error-kind-to-status mapping follows spec §7's table: validation and
//! state/business-rule failures are 4xx with `user_error = true` (the
//! message is safe to show a cashier); storage and system failures are 5xx
//! with `user_error = false` (the message is for operators, not staff).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use pos_cart::CartError;
use pos_core::CoreError;
use pos_events::EventError;
use pos_stock::StockError;
use pos_storage::StorageError;
use pos_terminal::TerminalError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Terminal(#[from] TerminalError),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classifies an `ApiError` the way spec §7 classifies error kinds, into an
/// HTTP status and whether the message is safe to surface to an end user
/// (cashier-facing terminal UI) as opposed to an operator-only detail.
struct Classified {
    status: StatusCode,
    user_error: bool,
}

fn classify(err: &ApiError) -> Classified {
    use StatusCode as S;
    match err {
        ApiError::Core(CoreError::Validation(_))
        | ApiError::Core(CoreError::DiscountRestricted { .. })
        | ApiError::Core(CoreError::DiscountExceedsAmount { .. })
        | ApiError::Core(CoreError::DiscountPercentageOutOfRange { .. })
        | ApiError::Core(CoreError::SubtotalDiscountExceedsBalance { .. })
        | ApiError::Core(CoreError::AllocationFailed { .. })
        | ApiError::Core(CoreError::UnknownPaymentCode(_))
        | ApiError::Core(CoreError::DepositOver { .. })
        | ApiError::Core(CoreError::BalanceWouldGoNegative { .. })
        | ApiError::Core(CoreError::BalanceAlreadyZero)
        | ApiError::Core(CoreError::NotReadyToFinalize)
        | ApiError::Core(CoreError::InvalidEvent { .. })
        | ApiError::BadRequest(_) => Classified { status: S::BAD_REQUEST, user_error: true },

        ApiError::Core(CoreError::AlreadyVoided(_))
        | ApiError::Core(CoreError::AlreadyRefunded(_))
        | ApiError::Cart(CartError::AlreadyVoided { .. })
        | ApiError::Cart(CartError::AlreadyRefunded { .. })
        | ApiError::Cart(CartError::NotReadyToFinalize { .. })
        | ApiError::Cart(CartError::NothingToPay { .. })
        | ApiError::Cart(CartError::OverDepositNotAllowed { .. })
        | ApiError::Cart(CartError::UnknownPaymentMethod { .. })
        | ApiError::Terminal(TerminalError::InvalidTerminalStatus { .. }) => {
            Classified { status: S::CONFLICT, user_error: true }
        }

        ApiError::Cart(CartError::CartNotFound { .. })
        | ApiError::Cart(CartError::TransactionNotFound { .. })
        | ApiError::Terminal(TerminalError::TerminalNotFound { .. })
        | ApiError::Terminal(TerminalError::MasterDataNotFound { .. })
        | ApiError::Event(EventError::DeliveryStatusNotFound { .. })
        | ApiError::Storage(StorageError::NotFound { .. })
        | ApiError::NotFound(_) => Classified { status: S::NOT_FOUND, user_error: true },

        ApiError::Unauthorized(_) => Classified { status: S::UNAUTHORIZED, user_error: true },
        ApiError::Forbidden(_) => Classified { status: S::FORBIDDEN, user_error: true },

        ApiError::Storage(StorageError::AlreadyExists { .. }) => {
            Classified { status: S::CONFLICT, user_error: true }
        }

        ApiError::Terminal(TerminalError::CounterContention { .. }) => {
            Classified { status: S::SERVICE_UNAVAILABLE, user_error: false }
        }

        ApiError::Storage(_)
        | ApiError::Terminal(_)
        | ApiError::Event(_)
        | ApiError::Stock(_)
        | ApiError::Cart(_)
        | ApiError::Core(_)
        | ApiError::Internal(_) => Classified { status: S::INTERNAL_SERVER_ERROR, user_error: false },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let classified = classify(&self);
        let body = ApiResponse::<()>::error(classified.status.as_u16(), self.to_string(), classified.user_error);
        (classified.status, Json(body)).into_response()
    }
}

/// Response envelope every handler returns, camelCase on the wire (spec §6).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub user_error: bool,
    pub operation: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(operation: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            code: 200,
            message: "ok".to_string(),
            data: Some(data),
            metadata: None,
            user_error: false,
            operation: operation.into(),
        }
    }

    pub fn ok_with_metadata(operation: impl Into<String>, data: T, metadata: Value) -> Self {
        ApiResponse {
            success: true,
            code: 200,
            message: "ok".to_string(),
            data: Some(data),
            metadata: Some(metadata),
            user_error: false,
            operation: operation.into(),
        }
    }
}

impl ApiResponse<()> {
    fn error(code: u16, message: String, user_error: bool) -> Self {
        ApiResponse {
            success: false,
            code,
            message,
            data: None,
            metadata: None,
            user_error,
            operation: "unknown".to_string(),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
