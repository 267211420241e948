//! Subscriber delivery callback (spec §4.5.2 step 4): a downstream
//! service that consumed an event off the bus reports back here so the
//! `DeliveryStatus` document's per-service state — and therefore whether
//! the republisher needs to keep retrying it — gets updated.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::middleware::TenantHeader;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeliveryReportBody {
    pub event_id: String,
    pub service_name: String,
    pub delivered: bool,
}

pub async fn report_delivery(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Json(body): Json<DeliveryReportBody>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    ctx.publisher.report_delivery(&body.event_id, &body.service_name, body.delivered).await?;
    Ok(Json(crate::error::ApiResponse::ok("reportDelivery", serde_json::json!({ "eventId": body.event_id }))))
}
