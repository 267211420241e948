//! Transaction endpoints (spec §6): list/get/void/return. Void and return
//! both go through `CartEngine`, which already owns the lookup,
//! validation against the out-of-band `TransactionStatus` overlay, and
//! republishing the derived log (spec §4.4.6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use pos_core::{Payment, StaffRef};
use serde::Deserialize;

use crate::dto::to_camel_value;
use crate::error::ApiResult;
use crate::middleware::TenantHeader;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub store_code: Option<String>,
    pub business_date: Option<String>,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<ListTransactionsQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let mut filter = bson::Document::new();
    if let Some(store_code) = &query.store_code {
        filter.insert("store_code", store_code);
    }
    if let Some(business_date) = &query.business_date {
        filter.insert("business_date", business_date);
    }
    let (docs, total) = ctx.storage.list("transaction_logs", filter, query.limit, query.page, Some(bson::doc! { "generate_date_time": -1 })).await?;
    let logs: Vec<pos_core::TransactionLog> = docs
        .into_iter()
        .filter_map(|d| bson::from_document(d).ok())
        .collect();
    Ok(Json(crate::error::ApiResponse::ok_with_metadata(
        "listTransactions",
        to_camel_value(&logs),
        serde_json::json!({ "total": total, "page": query.page, "limit": query.limit }),
    )))
}

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((terminal_id, transaction_no)): Path<(String, i64)>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let log = ctx.cart_engine.read_transaction(&terminal_id, transaction_no).await?;
    Ok(Json(crate::error::ApiResponse::ok("getTransaction", to_camel_value(&log))))
}

#[derive(Debug, Deserialize)]
pub struct PaymentRefundInput {
    pub payment_no: u32,
    pub payment_code: String,
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct VoidOrReturnBody {
    pub staff_id: String,
    pub staff_name: Option<String>,
    #[serde(default)]
    pub payments: Vec<PaymentRefundInput>,
}

fn payments_from(inputs: Vec<PaymentRefundInput>) -> Vec<Payment> {
    inputs
        .into_iter()
        .map(|p| Payment {
            payment_no: p.payment_no,
            payment_code: p.payment_code,
            description: p.description,
            deposit_amount: pos_core::Money::from_cents(p.amount),
            amount: pos_core::Money::from_cents(p.amount),
            change_amount: pos_core::Money::zero(),
            detail: None,
        })
        .collect()
}

pub async fn void_transaction(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((terminal_id, transaction_no)): Path<(String, i64)>,
    Json(body): Json<VoidOrReturnBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let staff = StaffRef { staff_id: body.staff_id, staff_name: body.staff_name };
    let log = ctx
        .cart_engine
        .void_transaction(&terminal_id, transaction_no, staff, payments_from(body.payments))
        .await?;

    if let Err(e) = pos_stock::process_transaction(&ctx.storage, &log, Some(ctx.alert_hub.as_ref())).await {
        tracing::warn!(error = %e, transaction_no = log.transaction_no, "stock processing failed for void");
    }
    Ok(Json(crate::error::ApiResponse::ok("voidTransaction", to_camel_value(&log))))
}

pub async fn return_transaction(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((terminal_id, transaction_no)): Path<(String, i64)>,
    Json(body): Json<VoidOrReturnBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let staff = StaffRef { staff_id: body.staff_id, staff_name: body.staff_name };
    let log = ctx
        .cart_engine
        .return_transaction(&terminal_id, transaction_no, staff, payments_from(body.payments))
        .await?;

    if let Err(e) = pos_stock::process_transaction(&ctx.storage, &log, Some(ctx.alert_hub.as_ref())).await {
        tracing::warn!(error = %e, transaction_no = log.transaction_no, "stock processing failed for return");
    }
    Ok(Json(crate::error::ApiResponse::ok("returnTransaction", to_camel_value(&log))))
}
