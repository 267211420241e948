//! # Domain Types
//!
//! Core domain types shared by the cart engine and its collaborators.
//! Everything here is a plain value type — no I/O, no database handles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate / Rounding
// =============================================================================

/// Tax rate represented in basis points (bps). 825 = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Process-wide rounding policy for discount allocation and tax, read from
/// `ROUND_METHOD_FOR_DISCOUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMethod {
    Floor,
    /// Named `Round` in the environment variable's vocabulary.
    HalfUp,
    Ceil,
}

impl Default for RoundingMethod {
    fn default() -> Self {
        RoundingMethod::HalfUp
    }
}

impl std::str::FromStr for RoundingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "floor" => Ok(RoundingMethod::Floor),
            "round" | "half_up" | "halfup" => Ok(RoundingMethod::HalfUp),
            "ceil" | "ceiling" => Ok(RoundingMethod::Ceil),
            other => Err(format!("unknown rounding method '{other}'")),
        }
    }
}

// =============================================================================
// Tax type (External / Internal)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    /// Added on top of line amount; affects balance.
    External,
    /// Included in line amount; reported separately; does not affect balance.
    Internal,
}

/// One applicable tax row on a finalized cart (spec §3 `Tax`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tax {
    pub tax_no: u32,
    pub tax_code: String,
    pub tax_type: TaxKind,
    pub tax_name: String,
    pub tax_amount: Money,
    pub target_amount: Money,
    pub target_quantity: i64,
}

/// A tax rule fetched from the master-data read-through cache.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRule {
    pub tax_code: String,
    pub tax_name: String,
    pub tax_type: TaxKind,
    pub rate: TaxRate,
    pub rounding_digit: u32,
    pub rounding_method: RoundingMethod,
}

// =============================================================================
// Discounts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Amount,
    Percentage,
}

/// A discount (line-item or subtotal) attached to a cart (spec §3 `Discount`).
///
/// `value` is the absolute amount or the percentage (0-100) depending on
/// `discount_type`; `amount` is the resolved cent value at application time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub seq_no: u32,
    pub discount_type: DiscountType,
    pub value: i64,
    pub amount: Money,
    pub detail: Option<String>,
}

// =============================================================================
// Line items
// =============================================================================

/// `CartLineItem` — spec §3.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLineItem {
    pub line_no: u32,
    pub item_code: String,
    pub description: String,
    pub unit_price: Money,
    pub unit_price_original: Money,
    pub is_unit_price_changed: bool,
    pub quantity: i64,
    pub amount: Money,
    pub tax_code: Option<String>,
    pub is_discount_restricted: bool,
    pub is_cancelled: bool,
    pub discounts: Vec<Discount>,
    pub discounts_allocated: Vec<Discount>,
    pub image_urls: Vec<String>,
}

impl CartLineItem {
    pub fn new(line_no: u32, item_code: impl Into<String>, description: impl Into<String>, unit_price: Money, quantity: i64) -> Self {
        CartLineItem {
            line_no,
            item_code: item_code.into(),
            description: description.into(),
            unit_price,
            unit_price_original: unit_price,
            is_unit_price_changed: false,
            quantity,
            amount: unit_price.multiply_quantity(quantity),
            tax_code: None,
            is_discount_restricted: false,
            is_cancelled: false,
            discounts: Vec::new(),
            discounts_allocated: Vec::new(),
            image_urls: Vec::new(),
        }
    }

    /// `amount = unit_price * quantity - Σ line_discounts.amount` (spec §4.4.2 step 1).
    /// A cancelled line always contributes zero.
    pub fn recompute_amount(&mut self) {
        if self.is_cancelled {
            self.amount = Money::zero();
            return;
        }
        let gross = self.unit_price.multiply_quantity(self.quantity);
        let discounted: Money = self.discounts.iter().map(|d| d.amount).sum();
        self.amount = gross - discounted;
    }
}

// =============================================================================
// Payments
// =============================================================================

/// `Payment` — spec §3. `amount` ≤ `deposit_amount`; the difference is
/// change, recorded separately by strategies that permit it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub payment_no: u32,
    pub payment_code: String,
    pub description: String,
    pub deposit_amount: Money,
    pub amount: Money,
    pub change_amount: Money,
    pub detail: Option<String>,
}

/// Capability flags for a payment method, sourced from the payment master
/// (spec §4.4.4 — "The payment master, not the strategy, decides the
/// capability flags").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentCapabilities {
    pub can_refund: bool,
    pub can_deposit_over: bool,
    pub can_change: bool,
}

// =============================================================================
// Transaction log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum TransactionType {
    NormalSales = 101,
    NormalSalesCancel = -101,
    ReturnSales = 102,
    VoidSales = 201,
    VoidReturn = 202,
    Open = 301,
    Close = 302,
    CashIn = 401,
    CashOut = 402,
}

impl TransactionType {
    pub const fn code(&self) -> i32 {
        *self as i32
    }
}

/// Immutable record produced on cart finalization (spec §3 `Transaction log`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionLog {
    pub tenant_id: String,
    pub store_code: String,
    pub terminal_id: String,
    pub transaction_no: i64,
    pub receipt_no: i64,
    pub transaction_type: TransactionType,
    pub business_date: String,
    pub open_counter: i64,
    pub business_counter: i64,
    #[ts(as = "String")]
    pub generate_date_time: DateTime<Utc>,
    pub origin: Option<i64>,
    pub is_voided: bool,
    pub is_refunded: bool,
    pub line_items: Vec<CartLineItem>,
    pub subtotal_discounts: Vec<Discount>,
    pub payments: Vec<Payment>,
    pub taxes: Vec<Tax>,
    pub staff: StaffRef,
    pub total_amount: Money,
    pub total_amount_with_tax: Money,
    pub total_discount_amount: Money,
    pub total_quantity: i64,
    pub tax_amount: Money,
}

/// Out-of-band mutation state keyed by `(tenant, store, terminal,
/// transaction_no)` (spec §3 `TransactionStatus`). Created lazily on first
/// void/return; the original log is never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionStatus {
    pub is_voided: bool,
    pub void_transaction_no: Option<i64>,
    #[ts(as = "Option<String>")]
    pub void_date_time: Option<DateTime<Utc>>,
    pub void_staff_id: Option<String>,
    pub is_refunded: bool,
    pub return_transaction_no: Option<i64>,
    #[ts(as = "Option<String>")]
    pub return_date_time: Option<DateTime<Utc>>,
    pub return_staff_id: Option<String>,
}

/// A single internal staff-reference shape used everywhere inside the cart
/// engine — the Open Question in spec §9 about varying staff shapes
/// (object vs. dict) is resolved by converting to this struct at the HTTP
/// boundary, never inside the engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StaffRef {
    pub staff_id: String,
    pub staff_name: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_method_parses_round_as_half_up() {
        assert_eq!("Round".parse::<RoundingMethod>().unwrap(), RoundingMethod::HalfUp);
        assert_eq!("floor".parse::<RoundingMethod>().unwrap(), RoundingMethod::Floor);
        assert_eq!("CEIL".parse::<RoundingMethod>().unwrap(), RoundingMethod::Ceil);
        assert!("bogus".parse::<RoundingMethod>().is_err());
    }

    #[test]
    fn line_item_recompute_subtracts_discounts() {
        let mut line = CartLineItem::new(1, "ITEM001", "Widget", Money::from_cents(100), 2);
        line.discounts.push(Discount {
            seq_no: 1,
            discount_type: DiscountType::Amount,
            value: 20,
            amount: Money::from_cents(20),
            detail: None,
        });
        line.recompute_amount();
        assert_eq!(line.amount.cents(), 180);
    }

    #[test]
    fn cancelled_line_contributes_nothing() {
        let mut line = CartLineItem::new(1, "ITEM001", "Widget", Money::from_cents(100), 2);
        line.is_cancelled = true;
        line.recompute_amount();
        assert_eq!(line.amount.cents(), 0);
    }
}
