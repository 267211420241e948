//! Stock domain types (spec §4.6).
//!
//! No `rename_all` on the structs below: they round-trip through
//! `bson::to_document` into the `stocks`/`stock_updates`/`stock_snapshots`
//! collections, whose indexes (`pos-storage::collections`) are declared on
//! the Rust field names verbatim. The HTTP layer camelCases them on the
//! way out (`apps/api-server::dto::to_camel_value`).

use chrono::{DateTime, Utc};
use pos_core::TransactionType;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Stock {
    pub tenant_id: String,
    pub store_code: String,
    pub item_code: String,
    pub current_quantity: i64,
    pub minimum_quantity: i64,
    pub reorder_point: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockUpdate {
    pub tenant_id: String,
    pub store_code: String,
    pub item_code: String,
    pub change: i64,
    pub before_quantity: i64,
    pub after_quantity: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_id: String,
    pub operator_id: Option<String>,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSnapshotEntry {
    pub item_code: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSnapshot {
    pub tenant_id: String,
    pub store_code: String,
    pub entries: Vec<StockSnapshotEntry>,
    pub generate_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StockEventKind {
    Sale,
    Void,
    Return,
    VoidReturn,
}

impl StockEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockEventKind::Sale => "sale",
            StockEventKind::Void => "void",
            StockEventKind::Return => "return",
            StockEventKind::VoidReturn => "void_return",
        }
    }
}

/// Derives `(sign, kind)` for a transaction type (spec §4.6.2). Returns
/// `None` for transaction types that do not move stock (open/close/cash
/// in-out, and the terminal-side `NormalSalesCancel` which never reaches
/// the ledger since a cancelled cart is never finalized).
pub fn sign_and_kind_for(transaction_type: TransactionType) -> Option<(i64, StockEventKind)> {
    match transaction_type {
        TransactionType::NormalSales => Some((-1, StockEventKind::Sale)),
        TransactionType::VoidSales => Some((1, StockEventKind::Void)),
        TransactionType::ReturnSales => Some((1, StockEventKind::Return)),
        TransactionType::VoidReturn => Some((-1, StockEventKind::VoidReturn)),
        TransactionType::NormalSalesCancel
        | TransactionType::Open
        | TransactionType::Close
        | TransactionType::CashIn
        | TransactionType::CashOut => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_kind_matches_spec_table() {
        assert_eq!(sign_and_kind_for(TransactionType::NormalSales), Some((-1, StockEventKind::Sale)));
        assert_eq!(sign_and_kind_for(TransactionType::VoidSales), Some((1, StockEventKind::Void)));
        assert_eq!(sign_and_kind_for(TransactionType::ReturnSales), Some((1, StockEventKind::Return)));
        assert_eq!(sign_and_kind_for(TransactionType::VoidReturn), Some((-1, StockEventKind::VoidReturn)));
        assert_eq!(sign_and_kind_for(TransactionType::Open), None);
    }
}
