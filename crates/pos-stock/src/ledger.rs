//! # Stock Mutation and Transaction-Event Processing (C6 §4.6.1 / §4.6.2)

use bson::doc;
use chrono::Utc;
use pos_core::{CartLineItem, TransactionLog};
use pos_storage::StorageGateway;
use tracing::info;

use crate::alerts::AlertHub;
use crate::error::StockResult;
use crate::types::{sign_and_kind_for, StockUpdate};

/// Atomically applies `change` to `(store_code, item_code)`'s current
/// quantity, records the mutation, and returns the post-image quantity.
/// Negative stock is allowed by design (spec §4.6.1) — callers that need
/// to forbid it (e.g. a storefront checkout) must check before calling.
///
/// When `alert_hub` is given, the post-image is evaluated against the
/// document's own `minimum_quantity`/`reorder_point` with no intervening
/// read (spec §5 "stock concurrency") — the thresholds come from the same
/// `atomic_upsert_inc` call that moved the quantity.
pub async fn update_stock(
    storage: &StorageGateway,
    store_code: &str,
    item_code: &str,
    change: i64,
    kind: &str,
    reference_id: &str,
    operator_id: Option<&str>,
    note: Option<&str>,
    alert_hub: Option<&AlertHub>,
) -> StockResult<i64> {
    let filter = doc! { "store_code": store_code, "item_code": item_code };
    let default_doc = doc! {
        "tenant_id": storage.tenant_id(),
        "store_code": store_code,
        "item_code": item_code,
        "minimum_quantity": 0_i64,
        "reorder_point": 0_i64,
        "updated_at": Utc::now(),
    };
    let after_doc = storage
        .atomic_upsert_inc("stocks", filter, doc! { "current_quantity": change }, default_doc)
        .await?;
    let after = after_doc.get_i64("current_quantity").unwrap_or(change);
    let before = after - change;

    let update = StockUpdate {
        tenant_id: storage.tenant_id().to_string(),
        store_code: store_code.to_string(),
        item_code: item_code.to_string(),
        change,
        before_quantity: before,
        after_quantity: after,
        kind: kind.to_string(),
        reference_id: reference_id.to_string(),
        operator_id: operator_id.map(str::to_string),
        note: note.map(str::to_string),
        timestamp: Utc::now(),
    };
    let update_doc = bson::to_document(&update).map_err(|e| pos_storage::StorageError::Internal(e.to_string()))?;
    storage.create("stock_updates", update_doc).await?;

    if let Some(hub) = alert_hub {
        let minimum = after_doc.get_i64("minimum_quantity").unwrap_or(0);
        let reorder_point = after_doc.get_i64("reorder_point").unwrap_or(0);
        hub.evaluate(item_code, after, minimum, reorder_point);
    }

    info!(store_code, item_code, change, after, "stock mutated");
    Ok(after)
}

/// Processes a finalized transaction log against the stock ledger (spec
/// §4.6.2). Cancelled lines and lines with non-positive quantity are
/// skipped; everything else is applied one `update_stock` call at a time
/// with `change = sign * quantity`.
pub async fn process_transaction(storage: &StorageGateway, log: &TransactionLog, alert_hub: Option<&AlertHub>) -> StockResult<()> {
    let Some((sign, kind)) = sign_and_kind_for(log.transaction_type) else {
        return Ok(());
    };

    for line in lines_to_apply(&log.line_items) {
        let change = sign * line.quantity;
        update_stock(
            storage,
            &log.store_code,
            &line.item_code,
            change,
            kind.as_str(),
            &log.transaction_no.to_string(),
            Some(&log.staff.staff_id),
            None,
            alert_hub,
        )
        .await?;
    }
    Ok(())
}

fn lines_to_apply(lines: &[CartLineItem]) -> impl Iterator<Item = &CartLineItem> {
    lines.iter().filter(|l| !l.is_cancelled && l.quantity > 0)
}
