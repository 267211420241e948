//! Journal/report query endpoints (spec §6). `journal_entries` is written
//! as a `TransactionLog`-shaped copy alongside every finalized/void/return
//! transaction (`pos_cart::engine::write_transaction_and_journal`), so
//! reporting reads from it directly rather than re-deriving totals from
//! `transaction_logs`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use bson::doc;
use pos_core::{Money, TransactionLog, TransactionType};
use serde::Deserialize;

use crate::dto::to_camel_value;
use crate::error::ApiResult;
use crate::middleware::TenantHeader;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JournalQuery {
    pub store_code: Option<String>,
    pub terminal_id: Option<String>,
    pub business_date: Option<String>,
    /// Inclusive business-date range, used by flash/daily reports instead of
    /// `business_date` when a single day isn't enough.
    pub business_date_from: Option<String>,
    pub business_date_to: Option<String>,
    pub transaction_type: Option<i32>,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

fn apply_business_date_filter(filter: &mut bson::Document, query: &JournalQuery) {
    if let Some(business_date) = &query.business_date {
        filter.insert("business_date", business_date);
    } else if query.business_date_from.is_some() || query.business_date_to.is_some() {
        let mut range = bson::Document::new();
        if let Some(from) = &query.business_date_from {
            range.insert("$gte", from);
        }
        if let Some(to) = &query.business_date_to {
            range.insert("$lte", to);
        }
        filter.insert("business_date", range);
    }
}

pub async fn list_journal(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<JournalQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let mut filter = bson::Document::new();
    if let Some(store_code) = &query.store_code {
        filter.insert("store_code", store_code);
    }
    if let Some(terminal_id) = &query.terminal_id {
        filter.insert("terminal_id", terminal_id);
    }
    apply_business_date_filter(&mut filter, &query);
    if let Some(transaction_type) = query.transaction_type {
        filter.insert("transaction_type", transaction_type);
    }
    let (docs, total) = ctx
        .storage
        .list("journal_entries", filter, query.limit, query.page, Some(doc! { "generate_date_time": -1 }))
        .await?;
    let entries: Vec<TransactionLog> = docs.into_iter().filter_map(|d| bson::from_document(d).ok()).collect();
    Ok(Json(crate::error::ApiResponse::ok_with_metadata(
        "listJournal",
        to_camel_value(&entries),
        serde_json::json!({ "total": total, "page": query.page, "limit": query.limit }),
    )))
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub transaction_count: u64,
    pub total_amount: i64,
    pub total_quantity: i64,
}

/// Aggregates sales for a business date (spec §6's reporting group).
/// Cancelled and voided legs are excluded by filtering on the positive
/// `TransactionType` family — this mirrors `sign_and_kind_for`'s notion of
/// which transaction types move stock forward, applied here to revenue
/// instead.
pub async fn sales_summary(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<JournalQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let mut filter = doc! { "is_voided": false };
    if let Some(store_code) = &query.store_code {
        filter.insert("store_code", store_code);
    }
    apply_business_date_filter(&mut filter, &query);
    let (docs, _) = ctx.storage.list("journal_entries", filter, 10_000, 0, None).await?;
    let entries: Vec<TransactionLog> = docs.into_iter().filter_map(|d| bson::from_document(d).ok()).collect();

    let summary = SalesSummary {
        transaction_count: entries.len() as u64,
        total_amount: entries.iter().map(|e| e.total_amount_with_tax.cents()).sum(),
        total_quantity: entries.iter().map(|e| e.total_quantity).sum(),
    };
    Ok(Json(crate::error::ApiResponse::ok("salesSummary", to_camel_value(&summary))))
}

/// One of the bucketed rows of a sales report (総売上/返品/明細値引/小計値引/純売上).
#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBucket {
    pub amount: i64,
    pub quantity: i64,
    pub count: u64,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxReportLine {
    pub tax_code: String,
    pub tax_name: String,
    pub tax_amount: i64,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReportLine {
    pub payment_code: String,
    pub amount: i64,
    pub count: u64,
}

/// Sales report formula, ported from the sign convention in
/// `sales_report_receipt_data.py`: 純売上 = 総売上 − 返品 − 明細値引 −
/// 小計値引 − 税額. Every bucket is a business-date aggregate over
/// `journal_entries`, tax-inclusive; a return leg subtracts from every
/// bucket it appears in so a sale/return pair nets to zero.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub sales_gross: ReportBucket,
    pub returns: ReportBucket,
    pub discount_for_lineitems: ReportBucket,
    pub discount_for_subtotal: ReportBucket,
    pub sales_net: ReportBucket,
    pub taxes: Vec<TaxReportLine>,
    pub payments: Vec<PaymentReportLine>,
}

/// Aggregates a business date's `journal_entries` into the sales-report
/// formula (spec §8 scenarios 2-4). Payment counts are deduplicated by
/// transaction number per payment code — a split payment (one sale, three
/// tenders of the same code) counts as one transaction, not three, matching
/// the fix verified by `test_split_payment_bug.py` in the original service.
pub async fn sales_report(
    State(state): State<Arc<AppState>>,
    TenantHeader(tenant_id): TenantHeader,
    Query(query): Query<JournalQuery>,
) -> ApiResult<serde_json::Value> {
    let ctx = state.tenant(&tenant_id).await?;
    let mut filter = doc! { "is_voided": false };
    if let Some(store_code) = &query.store_code {
        filter.insert("store_code", store_code);
    }
    apply_business_date_filter(&mut filter, &query);
    let (docs, _) = ctx.storage.list("journal_entries", filter, 10_000, 0, None).await?;
    let entries: Vec<TransactionLog> = docs.into_iter().filter_map(|d| bson::from_document(d).ok()).collect();

    let mut sales_gross = ReportBucket::default();
    let mut returns = ReportBucket::default();
    let mut line_discount = Money::zero();
    let mut subtotal_discount = Money::zero();
    let mut taxes_by_code: HashMap<String, (String, Money)> = HashMap::new();
    let mut payments_by_code: HashMap<String, (Money, HashSet<i64>)> = HashMap::new();

    for entry in &entries {
        let is_return = matches!(entry.transaction_type, TransactionType::ReturnSales | TransactionType::VoidReturn);
        let sign: i64 = if is_return { -1 } else { 1 };

        let line_disc: Money = entry.line_items.iter().flat_map(|l| l.discounts.iter()).map(|d| d.amount).sum();
        let subtotal_disc: Money = entry.subtotal_discounts.iter().map(|d| d.amount).sum();
        line_discount += line_disc * sign;
        subtotal_discount += subtotal_disc * sign;

        if is_return {
            returns.amount += entry.total_amount_with_tax.cents();
            returns.quantity += entry.total_quantity;
            returns.count += 1;
        } else {
            // Gross is tax-inclusive and pre-discount: add the discounts
            // that were already netted out of total_amount_with_tax back in.
            sales_gross.amount += (entry.total_amount_with_tax + entry.total_discount_amount).cents();
            sales_gross.quantity += entry.total_quantity;
            sales_gross.count += 1;
        }

        for tax in &entry.taxes {
            let row = taxes_by_code.entry(tax.tax_code.clone()).or_insert((tax.tax_name.clone(), Money::zero()));
            row.1 += tax.tax_amount * sign;
        }

        for payment in &entry.payments {
            let row = payments_by_code.entry(payment.payment_code.clone()).or_insert((Money::zero(), HashSet::new()));
            row.0 += payment.amount * sign;
            row.1.insert(entry.transaction_no);
        }
    }

    let tax_total: Money = taxes_by_code.values().map(|(_, amount)| *amount).sum();
    let net_amount = Money::from_cents(sales_gross.amount)
        - Money::from_cents(returns.amount)
        - line_discount
        - subtotal_discount
        - tax_total;

    let mut taxes: Vec<TaxReportLine> = taxes_by_code
        .into_iter()
        .map(|(tax_code, (tax_name, amount))| TaxReportLine { tax_code, tax_name, tax_amount: amount.cents() })
        .collect();
    taxes.sort_by(|a, b| a.tax_code.cmp(&b.tax_code));

    let mut payments: Vec<PaymentReportLine> = payments_by_code
        .into_iter()
        .map(|(payment_code, (amount, transactions))| PaymentReportLine {
            payment_code,
            amount: amount.cents(),
            count: transactions.len() as u64,
        })
        .collect();
    payments.sort_by(|a, b| a.payment_code.cmp(&b.payment_code));

    let report = SalesReport {
        sales_gross,
        returns,
        discount_for_lineitems: ReportBucket { amount: line_discount.cents(), quantity: 0, count: 0 },
        discount_for_subtotal: ReportBucket { amount: subtotal_discount.cents(), quantity: 0, count: 0 },
        sales_net: ReportBucket { amount: net_amount.cents(), quantity: 0, count: 0 },
        taxes,
        payments,
    };
    Ok(Json(crate::error::ApiResponse::ok("salesReport", to_camel_value(&report))))
}
