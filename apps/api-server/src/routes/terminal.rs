//! Terminal lifecycle endpoints (spec §6): create/sign-in/open/close/
//! cash-in/cash-out/delete. Terminal creation is a back-office operation
//! (JWT bearer); every other operation is something the physical register
//! itself calls, authenticated by its own API key (spec §6's per-terminal
//! `X-API-KEY` scheme) rather than a cashier's bearer token.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use pos_core::{Money, StaffRef};
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::to_camel_value;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{authenticate_terminal, ApiKeyHeader, BearerClaims, TenantHeader};
use crate::state::AppState;

fn generate_api_key() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateTerminalBody {
    pub store_code: String,
    pub terminal_no: i32,
}

/// Only a superuser or an account scoped to the same tenant may provision
/// a new terminal.
pub async fn create_terminal(
    State(state): State<Arc<AppState>>,
    BearerClaims(claims): BearerClaims,
    Json(body): Json<CreateTerminalBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&claims.tenant_id).await?;
    let api_key = generate_api_key();
    let terminal = pos_terminal::Terminal::new(claims.tenant_id.clone(), body.store_code, body.terminal_no, api_key);
    pos_terminal::save_terminal(&ctx.storage, &terminal).await?;
    Ok(Json(crate::error::ApiResponse::ok("createTerminal", to_camel_value(&terminal))))
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub staff_id: String,
    pub staff_name: Option<String>,
    pub api_key: String,
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, terminal_no)): Path<(String, i32)>,
    Json(body): Json<SignInBody>,
) -> ApiResult<serde_json::Value> {
    authenticate_terminal(&state, &tenant_id, &store_code, terminal_no, &body.api_key).await?;
    let ctx = state.tenant(&tenant_id).await?;
    let mut terminal = pos_terminal::load_terminal(&ctx.storage, &store_code, terminal_no).await?;
    terminal.sign_in(StaffRef { staff_id: body.staff_id, staff_name: body.staff_name });
    pos_terminal::save_terminal(&ctx.storage, &terminal).await?;
    Ok(Json(crate::error::ApiResponse::ok("signIn", to_camel_value(&terminal))))
}

#[derive(Debug, Deserialize)]
pub struct OpenBody {
    pub business_date: String,
    pub initial_cash_amount: i64,
    pub api_key: String,
}

pub async fn open_terminal(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, terminal_no)): Path<(String, i32)>,
    Json(body): Json<OpenBody>,
) -> ApiResult<serde_json::Value> {
    let terminal = authenticate_terminal(&state, &tenant_id, &store_code, terminal_no, &body.api_key).await?;
    let ctx = state.tenant(&tenant_id).await?;
    let staff = terminal.current_staff.clone().ok_or_else(|| ApiError::BadRequest("terminal must sign in before opening".to_string()))?;
    let mut terminal = terminal;
    terminal.open(body.business_date, staff, Money::from_cents(body.initial_cash_amount));
    pos_terminal::save_terminal(&ctx.storage, &terminal).await?;
    Ok(Json(crate::error::ApiResponse::ok("openTerminal", to_camel_value(&terminal))))
}

#[derive(Debug, Deserialize)]
pub struct CloseBody {
    pub physical_cash_amount: i64,
    pub api_key: String,
}

pub async fn close_terminal(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, terminal_no)): Path<(String, i32)>,
    Json(body): Json<CloseBody>,
) -> ApiResult<serde_json::Value> {
    let mut terminal = authenticate_terminal(&state, &tenant_id, &store_code, terminal_no, &body.api_key).await?;
    let ctx = state.tenant(&tenant_id).await?;
    terminal.close(Money::from_cents(body.physical_cash_amount));
    pos_terminal::save_terminal(&ctx.storage, &terminal).await?;
    Ok(Json(crate::error::ApiResponse::ok("closeTerminal", to_camel_value(&terminal))))
}

#[derive(Debug, Deserialize)]
pub struct CashMovementBody {
    pub amount: i64,
    pub staff_id: String,
    pub note: Option<String>,
    pub api_key: String,
}

/// Cash-in/cash-out are recorded as stock-ledger-style movement entries
/// against the terminal's own drawer rather than an item (spec §6 groups
/// them with the terminal surface, not the stock one); this process
/// treats the cash drawer amount as a `Money` adjustment recorded via the
/// same `StockUpdate`-shaped audit trail pattern, keyed by `terminal_id`
/// instead of `item_code`.
pub async fn cash_in(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, terminal_no)): Path<(String, i32)>,
    Json(body): Json<CashMovementBody>,
) -> ApiResult<serde_json::Value> {
    record_cash_movement(&state, &tenant_id, &store_code, terminal_no, body, true).await
}

pub async fn cash_out(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, terminal_no)): Path<(String, i32)>,
    Json(body): Json<CashMovementBody>,
) -> ApiResult<serde_json::Value> {
    record_cash_movement(&state, &tenant_id, &store_code, terminal_no, body, false).await
}

async fn record_cash_movement(
    state: &Arc<AppState>,
    tenant_id: &str,
    store_code: &str,
    terminal_no: i32,
    body: CashMovementBody,
    is_cash_in: bool,
) -> ApiResult<serde_json::Value> {
    let terminal = authenticate_terminal(state, tenant_id, store_code, terminal_no, &body.api_key).await?;
    let ctx = state.tenant(tenant_id).await?;
    let transaction_type = if is_cash_in { pos_core::TransactionType::CashIn } else { pos_core::TransactionType::CashOut };
    let log = pos_core::TransactionLog {
        tenant_id: tenant_id.to_string(),
        store_code: store_code.to_string(),
        terminal_id: terminal.terminal_id(),
        transaction_no: 0,
        receipt_no: 0,
        transaction_type,
        business_date: terminal.business_date.clone(),
        open_counter: terminal.open_counter,
        business_counter: terminal.business_counter,
        generate_date_time: chrono::Utc::now(),
        origin: None,
        is_voided: false,
        is_refunded: false,
        line_items: Vec::new(),
        subtotal_discounts: Vec::new(),
        payments: Vec::new(),
        taxes: Vec::new(),
        staff: StaffRef { staff_id: body.staff_id, staff_name: None },
        total_amount: Money::from_cents(body.amount),
        total_amount_with_tax: Money::from_cents(body.amount),
        total_discount_amount: Money::zero(),
        total_quantity: 0,
        tax_amount: Money::zero(),
    };
    let event_id = ctx.publisher.publish("topic-cashlog", &["journal"], serde_json::json!(&log)).await?;
    Ok(Json(crate::error::ApiResponse::ok_with_metadata(
        if is_cash_in { "cashIn" } else { "cashOut" },
        to_camel_value(&log),
        serde_json::json!({ "eventId": event_id }),
    )))
}

pub async fn delete_terminal(
    State(state): State<Arc<AppState>>,
    BearerClaims(claims): BearerClaims,
    Path((store_code, terminal_no)): Path<(String, i32)>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&claims.tenant_id).await?;
    let deleted = pos_terminal::delete_terminal(&ctx.storage, &store_code, terminal_no).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("terminal {store_code}-{terminal_no} not found")));
    }
    Ok(Json(crate::error::ApiResponse::ok("deleteTerminal", serde_json::json!({ "deleted": true }))))
}

pub async fn get_terminal(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    ApiKeyHeader(api_key): ApiKeyHeader,
    Path((store_code, terminal_no)): Path<(String, i32)>,
) -> ApiResult<serde_json::Value> {
    let terminal = authenticate_terminal(&state, &tenant_id, &store_code, terminal_no, &api_key).await?;
    Ok(Json(crate::error::ApiResponse::ok("getTerminal", to_camel_value(&terminal))))
}
