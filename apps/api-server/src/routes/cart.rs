//! Cart endpoints (spec §6): `POST /api/v1/carts` through `/resume-item-entry`.
//! Every handler loads the cart's terminal to resolve `tenant_id`, then
//! drives `CartEngine` directly — the engine already owns locking,
//! master-data resolution, and persistence, so these handlers are thin
//! request/response translation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use pos_core::{DiscountType, Money, StaffRef};
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::to_camel_value;
use crate::error::{ApiError, ApiResult};
use crate::middleware::TenantHeader;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCartQuery {
    pub terminal_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCartBody {
    pub staff_id: Option<String>,
    pub staff_name: Option<String>,
}

pub async fn create_cart(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<CreateCartQuery>,
    Json(body): Json<CreateCartBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart_id = Uuid::new_v4().to_string();
    let staff = body.staff_id.map(|staff_id| StaffRef { staff_id, staff_name: body.staff_name });
    let cart = ctx.cart_engine.create_cart(&query.terminal_id, &cart_id, staff).await?;
    Ok(Json(crate::error::ApiResponse::ok("createCart", to_camel_value(&cart))))
}

#[derive(Debug, Deserialize)]
pub struct LineItemInput {
    pub item_code: String,
    pub quantity: i64,
    pub unit_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddLineItemsBody {
    pub line_items: Vec<LineItemInput>,
}

pub async fn add_line_items(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Json(body): Json<AddLineItemsBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let items = body
        .line_items
        .into_iter()
        .map(|i| pos_cart::NewLineItem {
            item_code: i.item_code,
            quantity: i.quantity,
            unit_price_override: i.unit_price.map(Money::from_cents),
        })
        .collect();
    let cart = ctx.cart_engine.add_items(&tenant_id, &cart_id, items).await?;
    Ok(Json(crate::error::ApiResponse::ok("addLineItems", to_camel_value(&cart))))
}

#[derive(Debug, Deserialize)]
pub struct CancelLineQuery {
    pub line_no: u32,
}

pub async fn cancel_line(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Query(query): Query<CancelLineQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart = ctx.cart_engine.cancel_line(&tenant_id, &cart_id, query.line_no).await?;
    Ok(Json(crate::error::ApiResponse::ok("cancelLine", to_camel_value(&cart))))
}

#[derive(Debug, Deserialize)]
pub struct OverridePriceBody {
    pub line_no: u32,
    pub unit_price: i64,
}

pub async fn override_unit_price(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Json(body): Json<OverridePriceBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart = ctx
        .cart_engine
        .override_unit_price(&tenant_id, &cart_id, body.line_no, Money::from_cents(body.unit_price))
        .await?;
    Ok(Json(crate::error::ApiResponse::ok("overrideUnitPrice", to_camel_value(&cart))))
}

#[derive(Debug, Deserialize)]
pub struct DiscountBody {
    pub line_no: Option<u32>,
    pub discount_type: DiscountType,
    pub value: i64,
    pub detail: Option<String>,
}

pub async fn add_line_discount(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Json(body): Json<DiscountBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let line_no = body.line_no.ok_or_else(|| ApiError::BadRequest("lineNo is required".to_string()))?;
    let cart = ctx
        .cart_engine
        .add_line_discount(&tenant_id, &cart_id, line_no, body.discount_type, body.value, body.detail)
        .await?;
    Ok(Json(crate::error::ApiResponse::ok("addLineDiscount", to_camel_value(&cart))))
}

pub async fn add_subtotal_discount(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Json(body): Json<DiscountBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart = ctx
        .cart_engine
        .add_subtotal_discount(&tenant_id, &cart_id, body.discount_type, body.value, body.detail)
        .await?;
    Ok(Json(crate::error::ApiResponse::ok("addSubtotalDiscount", to_camel_value(&cart))))
}

pub async fn subtotal(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart = ctx.cart_engine.subtotal(&tenant_id, &cart_id).await?;
    Ok(Json(crate::error::ApiResponse::ok("subtotal", to_camel_value(&cart))))
}

#[derive(Debug, Deserialize)]
pub struct PaymentInput {
    pub payment_code: String,
    pub deposit_amount: i64,
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddPaymentsBody {
    pub payments: Vec<PaymentInput>,
}

pub async fn add_payments(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Json(body): Json<AddPaymentsBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let payments = body
        .payments
        .into_iter()
        .map(|p| pos_cart::NewPayment { payment_code: p.payment_code, deposit_amount: Money::from_cents(p.deposit_amount), detail: p.detail })
        .collect();
    let cart = ctx.cart_engine.add_payments(&tenant_id, &cart_id, payments).await?;
    Ok(Json(crate::error::ApiResponse::ok("addPayments", to_camel_value(&cart))))
}

pub async fn resume_item_entry(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart = ctx.cart_engine.resume_item_entry(&cart_id).await?;
    Ok(Json(crate::error::ApiResponse::ok("resumeItemEntry", to_camel_value(&cart))))
}

pub async fn cancel_cart(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let cart = ctx.cart_engine.cancel_cart(&cart_id).await?;
    Ok(Json(crate::error::ApiResponse::ok("cancelCart", to_camel_value(&cart))))
}

#[derive(Debug, Deserialize)]
pub struct BillQuery {
    pub store_code: String,
    pub terminal_id: String,
    pub business_date: String,
    pub open_counter: i64,
    pub business_counter: i64,
}

/// Finalizes a cart, then runs the two side effects a successful bill
/// triggers outside the cart engine itself: stock processing and stock
/// alert evaluation (spec §4.6.2). Both best-effort — a failure here is
/// logged, not surfaced, since the transaction log is already durably
/// committed and the republisher/alert stream are not the source of
/// truth for the sale itself.
pub async fn bill(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path(cart_id): Path<String>,
    Query(query): Query<BillQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let log = ctx
        .cart_engine
        .bill(
            &tenant_id,
            &query.store_code,
            &query.terminal_id,
            &cart_id,
            &query.business_date,
            query.open_counter,
            query.business_counter,
        )
        .await?;

    if let Err(e) = pos_stock::process_transaction(&ctx.storage, &log, Some(ctx.alert_hub.as_ref())).await {
        tracing::warn!(error = %e, transaction_no = log.transaction_no, "stock processing failed for finalized transaction");
    }

    Ok(Json(crate::error::ApiResponse::ok("bill", to_camel_value(&log))))
}
