//! Stock endpoints (spec §6): read current quantity, manual adjustment,
//! movement history, snapshots, alert streams, and the schedule
//! management surface for the per-tenant snapshot job (C6 §4.6.3).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use bson::doc;
use pos_stock::{ScheduleFrequency, SnapshotSchedule};
use serde::Deserialize;

use crate::dto::to_camel_value;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{BearerClaims, TenantHeader};
use crate::state::AppState;

pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, item_code)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let filter = doc! { "store_code": &store_code, "item_code": &item_code };
    let doc = ctx
        .storage
        .get("stocks", filter)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no stock record for {store_code}/{item_code}")))?;
    let value: serde_json::Value = bson::from_document(doc).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(crate::error::ApiResponse::ok("getStock", value)))
}

#[derive(Debug, Deserialize)]
pub struct ListStockQuery {
    pub store_code: Option<String>,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list_stock(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<ListStockQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let mut filter = bson::Document::new();
    if let Some(store_code) = &query.store_code {
        filter.insert("store_code", store_code);
    }
    let (docs, total) = ctx.storage.list("stocks", filter, query.limit, query.page, None).await?;
    let values: Vec<serde_json::Value> = docs.into_iter().filter_map(|d| bson::from_document(d).ok()).collect();
    Ok(Json(crate::error::ApiResponse::ok_with_metadata(
        "listStock",
        serde_json::json!(values),
        serde_json::json!({ "total": total, "page": query.page, "limit": query.limit }),
    )))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockBody {
    pub change: i64,
    pub kind: String,
    pub reference_id: String,
    pub operator_id: Option<String>,
    pub note: Option<String>,
}

pub async fn update_stock(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, item_code)): Path<(String, String)>,
    Json(body): Json<UpdateStockBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let after = pos_stock::update_stock(
        &ctx.storage,
        &store_code,
        &item_code,
        body.change,
        &body.kind,
        &body.reference_id,
        body.operator_id.as_deref(),
        body.note.as_deref(),
        Some(ctx.alert_hub.as_ref()),
    )
    .await?;
    Ok(Json(crate::error::ApiResponse::ok("updateStock", serde_json::json!({ "itemCode": item_code, "quantity": after }))))
}

#[derive(Debug, Deserialize)]
pub struct StockHistoryQuery {
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn stock_history(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Path((store_code, item_code)): Path<(String, String)>,
    Query(query): Query<StockHistoryQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let filter = doc! { "store_code": &store_code, "item_code": &item_code };
    let (docs, total) = ctx
        .storage
        .list("stock_updates", filter, query.limit, query.page, Some(doc! { "timestamp": -1 }))
        .await?;
    let updates: Vec<pos_stock::StockUpdate> = docs.into_iter().filter_map(|d| bson::from_document(d).ok()).collect();
    Ok(Json(crate::error::ApiResponse::ok_with_metadata(
        "stockHistory",
        to_camel_value(&updates),
        serde_json::json!({ "total": total, "page": query.page, "limit": query.limit }),
    )))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<SnapshotRangeQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let mut filter = bson::Document::new();
    if query.from.is_some() || query.to.is_some() {
        let mut range = bson::Document::new();
        if let Some(from) = &query.from {
            range.insert("$gte", iso_date(from)?);
        }
        if let Some(to) = &query.to {
            range.insert("$lte", iso_date(to)?);
        }
        filter.insert("generate_date_time", range);
    }
    let (docs, total) = ctx.storage.list("stock_snapshots", filter, 200, 0, Some(doc! { "generate_date_time": -1 })).await?;
    let snapshots: Vec<pos_stock::StockSnapshot> = docs.into_iter().filter_map(|d| bson::from_document(d).ok()).collect();
    Ok(Json(crate::error::ApiResponse::ok_with_metadata(
        "listSnapshots",
        to_camel_value(&snapshots),
        serde_json::json!({ "total": total }),
    )))
}

fn iso_date(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| ApiError::BadRequest(format!("invalid ISO-8601 timestamp: {raw}")))
}

#[derive(Debug, Deserialize)]
pub struct TriggerSnapshotBody {
    pub stores: Vec<String>,
    pub retention_days: i64,
}

/// Out-of-band manual snapshot (spec §6), bypassing the hourly gate —
/// the same entry point the admin CLI uses.
pub async fn trigger_snapshot(
    State(state): State<Arc<AppState>>,
    BearerClaims(claims): BearerClaims,
    Json(body): Json<TriggerSnapshotBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&claims.tenant_id).await?;
    let schedule = SnapshotSchedule {
        tenant_id: claims.tenant_id.clone(),
        frequency: ScheduleFrequency::Daily,
        hour: 0,
        minute: 0,
        stores: body.stores,
        retention_days: body.retention_days,
    };
    let snapshot = pos_stock::snapshot_now(&ctx.storage, &schedule).await?;
    Ok(Json(crate::error::ApiResponse::ok("triggerSnapshot", to_camel_value(&snapshot))))
}

#[derive(Debug, Deserialize)]
pub struct RetentionBody {
    pub retention_days: i64,
}

pub async fn set_retention(
    State(state): State<Arc<AppState>>,
    BearerClaims(claims): BearerClaims,
    Json(body): Json<RetentionBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&claims.tenant_id).await?;
    pos_stock::apply_retention_change(&ctx.storage, body.retention_days).await?;
    Ok(Json(crate::error::ApiResponse::ok("setRetention", serde_json::json!({ "retentionDays": body.retention_days }))))
}
