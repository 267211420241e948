//! # Cart Aggregate & Pricing Pipeline
//!
//! `Cart` is the pure, in-memory aggregate the engine mutates. This module
//! owns the four-stage pricing pipeline (spec §4.4.2) and the discount
//! rules that gate it (spec §4.4.3). It has no knowledge of storage,
//! locking, or the counter/event services — those live in `pos-cart`,
//! which wraps a `Cart` with I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::state_machine::{transition, CartEvent, CartStatus};
use crate::types::{CartLineItem, Discount, DiscountType, Payment, RoundingMethod, StaffRef, Tax, TaxKind, TaxRule};
use crate::validation::{validate_discount_amount_within, validate_discount_value};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub cart_id: String,
    pub status: CartStatus,
    pub line_items: Vec<CartLineItem>,
    pub subtotal_discounts: Vec<Discount>,
    pub payments: Vec<Payment>,
    pub taxes: Vec<Tax>,
    pub staff: Option<StaffRef>,

    // Sales rollup (spec §4.4.2 step 4), recomputed after every mutation.
    pub total_amount: Money,
    pub total_amount_with_tax: Money,
    pub total_discount_amount: Money,
    pub total_quantity: i64,
    pub tax_amount: Money,
    pub balance: Money,

    /// `shard_key` composite: `tenant_id-store_code-terminal_id` (spec §3
    /// "all mutable entities carry ... shard_key"). Set once at creation
    /// by the caller, who knows the owning terminal; `Cart` itself never
    /// derives it since the pure aggregate has no terminal reference.
    pub shard_key: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(cart_id: impl Into<String>) -> Self {
        Self::new_with_shard_key(cart_id, String::new())
    }

    pub fn new_with_shard_key(cart_id: impl Into<String>, shard_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Cart {
            cart_id: cart_id.into(),
            status: CartStatus::Initial,
            line_items: Vec::new(),
            subtotal_discounts: Vec::new(),
            payments: Vec::new(),
            taxes: Vec::new(),
            staff: None,
            total_amount: Money::zero(),
            total_amount_with_tax: Money::zero(),
            total_discount_amount: Money::zero(),
            total_quantity: 0,
            tax_amount: Money::zero(),
            balance: Money::zero(),
            shard_key: shard_key.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a state-machine event, returning the new status without
    /// running the pricing pipeline — callers recompute separately once the
    /// mutation that motivated the event has been applied, per spec
    /// §4.4.2's "on any state-affecting mutation" framing.
    pub fn apply_event(&mut self, event: CartEvent) -> CoreResult<()> {
        self.status = transition(self.status, event)?;
        if event == CartEvent::ResumeItemEntry {
            self.payments.clear();
        }
        Ok(())
    }

    pub fn next_line_no(&self) -> u32 {
        self.line_items.len() as u32 + 1
    }

    /// Sets a line's discount list wholesale (spec §4.4.3: "discounts are
    /// set-valued, not appended").
    pub fn set_line_discount(&mut self, line_no: u32, discount: Discount) -> CoreResult<()> {
        validate_discount_value(discount.discount_type, discount.value)?;
        let line = self
            .line_items
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| CoreError::UnknownPaymentCode(format!("line {line_no}")))?;

        if line.is_discount_restricted {
            return Err(CoreError::DiscountRestricted { line_no });
        }

        let resolved_amount = match discount.discount_type {
            DiscountType::Amount => Money::from_cents(discount.value),
            DiscountType::Percentage => {
                let gross = line.unit_price.multiply_quantity(line.quantity);
                Money::from_cents((gross.cents() as i128 * discount.value as i128 / 100) as i64)
            }
        };

        if discount.discount_type == DiscountType::Amount {
            let gross = line.unit_price.multiply_quantity(line.quantity);
            if !validate_discount_amount_within(resolved_amount, gross) {
                return Err(CoreError::DiscountExceedsAmount {
                    amount: resolved_amount.cents(),
                    line_amount: gross.cents(),
                });
            }
        }

        line.discounts = vec![Discount { amount: resolved_amount, ..discount }];
        Ok(())
    }

    /// Sets the subtotal discount list wholesale. Resolution of `Amount`
    /// discounts against the current balance happens in `recompute`, since
    /// the balance is only known after line-item recompute.
    pub fn set_subtotal_discounts(&mut self, discounts: Vec<Discount>) -> CoreResult<()> {
        for d in &discounts {
            validate_discount_value(d.discount_type, d.value)?;
        }
        self.subtotal_discounts = discounts;
        Ok(())
    }

    /// Runs the full four-stage pricing pipeline (spec §4.4.2). Must be
    /// called after every state-affecting mutation.
    pub fn recompute(&mut self, tax_rules: &HashMap<String, TaxRule>, rounding: RoundingMethod) -> CoreResult<()> {
        // Stage 1: line-item arithmetic.
        for line in &mut self.line_items {
            line.recompute_amount();
        }

        let pre_discount_subtotal: Money = self
            .line_items
            .iter()
            .filter(|l| !l.is_cancelled)
            .map(|l| l.amount)
            .sum();

        // Stage 2: subtotal-discount allocation.
        self.allocate_subtotal_discounts(pre_discount_subtotal, rounding)?;

        // Stage 3: tax computation.
        self.compute_taxes(tax_rules, rounding);

        // Stage 4: sales rollup.
        self.rollup();
        self.updated_at = Utc::now();

        Ok(())
    }

    fn allocate_subtotal_discounts(&mut self, subtotal: Money, rounding: RoundingMethod) -> CoreResult<()> {
        for line in &mut self.line_items {
            line.discounts_allocated.clear();
        }

        for i in 0..self.subtotal_discounts.len() {
            let discount = &self.subtotal_discounts[i];
            let resolved = match discount.discount_type {
                DiscountType::Amount => {
                    if !validate_discount_amount_within(Money::from_cents(discount.value), subtotal) {
                        return Err(CoreError::SubtotalDiscountExceedsBalance {
                            amount: discount.value,
                            balance: subtotal.cents(),
                        });
                    }
                    Money::from_cents(discount.value)
                }
                DiscountType::Percentage => subtotal.allocate_proportional(
                    Money::from_cents(discount.value),
                    Money::from_cents(100),
                    rounding,
                ),
            };

            self.subtotal_discounts[i].amount = resolved;
            allocate_to_lines(&mut self.line_items, resolved, subtotal, rounding)?;
        }
        Ok(())
    }

    fn compute_taxes(&mut self, tax_rules: &HashMap<String, TaxRule>, rounding: RoundingMethod) {
        self.taxes.clear();

        let mut by_code: HashMap<String, (Money, i64)> = HashMap::new();
        for line in self.line_items.iter().filter(|l| !l.is_cancelled) {
            let Some(code) = &line.tax_code else { continue };
            // target_amount is the line amount after subtotal-discount
            // allocation (spec §4.4.2 step 3); `line.amount` itself is
            // pre-allocation, so the allocated share is subtracted here.
            let allocated: Money = line.discounts_allocated.iter().map(|d| d.amount).sum();
            let net = line.amount - allocated;
            let entry = by_code.entry(code.clone()).or_insert((Money::zero(), 0));
            entry.0 += net;
            entry.1 += line.quantity;
        }

        let mut tax_no = 0;
        for (code, (target_amount, target_quantity)) in by_code {
            let Some(rule) = tax_rules.get(&code) else { continue };
            tax_no += 1;
            let tax_amount = target_amount.calculate_tax(rule.rate, rounding);
            self.taxes.push(Tax {
                tax_no,
                tax_code: code,
                tax_type: rule.tax_type,
                tax_name: rule.tax_name.clone(),
                tax_amount,
                target_amount,
                target_quantity,
            });
        }
    }

    fn rollup(&mut self) {
        let line_total: Money = self.line_items.iter().filter(|l| !l.is_cancelled).map(|l| l.amount).sum();
        let subtotal_discount_total: Money = self.subtotal_discounts.iter().map(|d| d.amount).sum();
        let line_discount_total: Money = self
            .line_items
            .iter()
            .filter(|l| !l.is_cancelled)
            .flat_map(|l| l.discounts.iter())
            .map(|d| d.amount)
            .sum();

        // line_total is pre-subtotal-discount (spec §4.4.2 step 1), so the
        // resolved subtotal-discount total is subtracted here, once.
        // total_amount is pre-external-tax; internal taxes are included in
        // line amounts already and reported but don't affect this figure.
        self.total_amount = line_total - subtotal_discount_total;

        let external_tax: Money = self
            .taxes
            .iter()
            .filter(|t| t.tax_type == TaxKind::External)
            .map(|t| t.tax_amount)
            .sum();
        self.tax_amount = external_tax;
        self.total_amount_with_tax = self.total_amount + external_tax;
        self.total_discount_amount = subtotal_discount_total + line_discount_total;
        self.total_quantity = self.line_items.iter().filter(|l| !l.is_cancelled).map(|l| l.quantity).sum();

        let paid: Money = self.payments.iter().map(|p| p.amount).sum();
        self.balance = self.total_amount_with_tax - paid;
    }
}

/// Distributes `discount_amount` across non-cancelled, non-restricted
/// lines proportionally by line amount, then assigns any rounding
/// remainder to the line(s) with the largest amount until the sum equals
/// `discount_amount` exactly (spec §4.4.2 step 2). Records each line's
/// share in `discounts_allocated` only — `line.amount` stays
/// `unit_price * quantity - Σ line_discounts.amount` throughout, so
/// downstream stages (tax, rollup) subtract the allocated share
/// themselves rather than finding it already folded in.
fn allocate_to_lines(
    lines: &mut [CartLineItem],
    discount_amount: Money,
    subtotal: Money,
    rounding: RoundingMethod,
) -> CoreResult<()> {
    if discount_amount.is_zero() {
        return Ok(());
    }

    let eligible: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.is_cancelled && !l.is_discount_restricted)
        .map(|(i, _)| i)
        .collect();

    if eligible.is_empty() {
        return Err(CoreError::AllocationFailed {
            discount_amount: discount_amount.cents(),
            line_total: 0,
        });
    }

    let mut allocated_total = Money::zero();
    let mut shares = Vec::with_capacity(eligible.len());
    for &idx in &eligible {
        let share = discount_amount.allocate_proportional(lines[idx].amount, subtotal, rounding);
        allocated_total += share;
        shares.push((idx, share));
    }

    let mut remainder = discount_amount.cents() - allocated_total.cents();
    if remainder != 0 {
        // Assign the remainder to the largest-amount eligible line(s), one
        // cent at a time, largest first — matches spec's "remainder
        // assigned to the line(s) with the largest amount" rule.
        let mut order: Vec<usize> = (0..shares.len()).collect();
        order.sort_by(|&a, &b| lines[eligible[b]].amount.cents().cmp(&lines[eligible[a]].amount.cents()));

        let step: i64 = if remainder > 0 { 1 } else { -1 };
        let mut oi = 0;
        while remainder != 0 {
            let pos = order[oi % order.len()];
            shares[pos].1 += Money::from_cents(step);
            remainder -= step;
            oi += 1;
        }
    }

    let mut check = Money::zero();
    for (idx, share) in shares {
        check += share;
        lines[idx].discounts_allocated.push(Discount {
            seq_no: lines[idx].discounts_allocated.len() as u32 + 1,
            discount_type: DiscountType::Amount,
            value: share.cents(),
            amount: share,
            detail: None,
        });
    }

    if check.cents() != discount_amount.cents() {
        return Err(CoreError::AllocationFailed {
            discount_amount: discount_amount.cents(),
            line_total: subtotal.cents(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tax_rules() -> HashMap<String, TaxRule> {
        let mut m = HashMap::new();
        m.insert(
            "STD".to_string(),
            TaxRule {
                tax_code: "STD".into(),
                tax_name: "Standard".into(),
                tax_type: TaxKind::External,
                rate: crate::types::TaxRate::from_bps(1000),
                rounding_digit: 0,
                rounding_method: RoundingMethod::HalfUp,
            },
        );
        m
    }

    #[test]
    fn simple_sale_balances_to_zero_after_cash_payment() {
        let mut cart = Cart::new("c1");
        cart.line_items.push(CartLineItem::new(1, "ITEM001", "Widget", Money::from_cents(100), 2));
        cart.recompute(&HashMap::new(), RoundingMethod::HalfUp).unwrap();
        assert_eq!(cart.total_amount_with_tax.cents(), 200);

        cart.payments.push(Payment {
            payment_no: 1,
            payment_code: "CASH".into(),
            description: "Cash".into(),
            deposit_amount: Money::from_cents(300),
            amount: Money::from_cents(200),
            change_amount: Money::from_cents(100),
            detail: None,
        });
        cart.recompute(&HashMap::new(), RoundingMethod::HalfUp).unwrap();
        assert_eq!(cart.balance.cents(), 0);
    }

    #[test]
    fn subtotal_discount_allocates_exactly_with_remainder() {
        let mut cart = Cart::new("c1");
        cart.line_items.push(CartLineItem::new(1, "A", "A", Money::from_cents(333), 1));
        cart.line_items.push(CartLineItem::new(2, "B", "B", Money::from_cents(333), 1));
        cart.line_items.push(CartLineItem::new(3, "C", "C", Money::from_cents(334), 1));
        cart.set_subtotal_discounts(vec![Discount {
            seq_no: 1,
            discount_type: DiscountType::Amount,
            value: 100,
            amount: Money::zero(),
            detail: None,
        }])
        .unwrap();
        cart.recompute(&HashMap::new(), RoundingMethod::HalfUp).unwrap();

        let allocated_total: i64 = cart
            .line_items
            .iter()
            .flat_map(|l| l.discounts_allocated.iter())
            .map(|d| d.amount.cents())
            .sum();
        assert_eq!(allocated_total, 100);
    }

    #[test]
    fn subtotal_discount_skips_restricted_lines() {
        let mut cart = Cart::new("c1");
        cart.line_items.push(CartLineItem::new(1, "A", "A", Money::from_cents(500), 1));
        let mut restricted = CartLineItem::new(2, "B", "B", Money::from_cents(500), 1);
        restricted.is_discount_restricted = true;
        cart.line_items.push(restricted);

        cart.set_subtotal_discounts(vec![Discount {
            seq_no: 1,
            discount_type: DiscountType::Amount,
            value: 500,
            amount: Money::zero(),
            detail: None,
        }])
        .unwrap();
        cart.recompute(&HashMap::new(), RoundingMethod::HalfUp).unwrap();

        assert!(cart.line_items[1].discounts_allocated.is_empty());
        assert_eq!(cart.line_items[0].discounts_allocated[0].amount.cents(), 500);
    }

    #[test]
    fn external_tax_adds_to_balance() {
        let mut cart = Cart::new("c1");
        let mut line = CartLineItem::new(1, "ITEM001", "Widget", Money::from_cents(1000), 1);
        line.tax_code = Some("STD".into());
        cart.line_items.push(line);
        cart.recompute(&tax_rules(), RoundingMethod::HalfUp).unwrap();

        assert_eq!(cart.tax_amount.cents(), 100);
        assert_eq!(cart.total_amount.cents(), 1000);
        assert_eq!(cart.total_amount_with_tax.cents(), 1100);
    }

    #[test]
    fn subtotal_discount_and_external_tax_compose() {
        // Spec §8 scenario 4: a 3,500 line with a 500 subtotal discount and
        // a 10% external tax taxes the post-allocation 3,000, not the
        // pre-allocation 3,500 and not a double-allocated 2,500.
        let mut cart = Cart::new("c1");
        let mut line = CartLineItem::new(1, "ITEM001", "Widget", Money::from_cents(3500), 1);
        line.tax_code = Some("STD".into());
        cart.line_items.push(line);
        cart.set_subtotal_discounts(vec![Discount {
            seq_no: 1,
            discount_type: DiscountType::Amount,
            value: 500,
            amount: Money::zero(),
            detail: None,
        }])
        .unwrap();
        cart.recompute(&tax_rules(), RoundingMethod::HalfUp).unwrap();

        assert_eq!(cart.tax_amount.cents(), 300);
        assert_eq!(cart.total_amount.cents(), 3000);
        assert_eq!(cart.total_amount_with_tax.cents(), 3300);
        assert_eq!(cart.total_discount_amount.cents(), 500);
        assert_eq!(cart.subtotal_discounts[0].amount.cents(), 500);
    }

    #[test]
    fn restricted_line_discount_is_rejected() {
        let mut cart = Cart::new("c1");
        let mut line = CartLineItem::new(1, "ITEM001", "Widget", Money::from_cents(1000), 1);
        line.is_discount_restricted = true;
        cart.line_items.push(line);

        let result = cart.set_line_discount(
            1,
            Discount {
                seq_no: 1,
                discount_type: DiscountType::Amount,
                value: 100,
                amount: Money::zero(),
                detail: None,
            },
        );
        assert!(matches!(result, Err(CoreError::DiscountRestricted { line_no: 1 })));
    }
}
