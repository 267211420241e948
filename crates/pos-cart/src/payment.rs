//! # Payment Strategies (spec §4.4.4)
//!
//! Payments dispatch on `payment_code` to a registered strategy sharing a
//! common interface. The spec's design note (§9) explicitly asks for
//! "function-typed fields plus capability flags read from the payment
//! master" rather than a class hierarchy — this module's `PaymentStrategy`
//! is a plain struct of fn pointers, and `PaymentRegistry` looks strategies
//! up by code, falling back to a generic strategy for codes the master
//! does not name a bespoke implementation for.

use pos_core::{CartStatus, CoreError, CoreResult, Money, Payment, PaymentCapabilities};

use crate::error::{CartError as IoCartError, CartResult};

impl From<pos_terminal::PaymentMethodRecord> for PaymentCapabilities {
    fn from(record: pos_terminal::PaymentMethodRecord) -> Self {
        PaymentCapabilities {
            can_refund: true,
            can_deposit_over: record.allows_over_deposit,
            can_change: record.allows_change,
        }
    }
}

/// `create_payment(cart, code, amount, detail)` (spec §4.4.4): appends a
/// `Payment` with `payment_no = len(payments)+1`; rejects if the cart's
/// balance is already zero.
pub fn create_payment(
    cart: &mut pos_core::Cart,
    payment_code: &str,
    description: &str,
    deposit_amount: Money,
    detail: Option<String>,
) -> CoreResult<()> {
    if cart.balance.cents() < 1 {
        return Err(CoreError::BalanceAlreadyZero);
    }
    cart.payments.push(Payment {
        payment_no: cart.payments.len() as u32 + 1,
        payment_code: payment_code.to_string(),
        description: description.to_string(),
        deposit_amount,
        amount: deposit_amount,
        change_amount: Money::zero(),
        detail,
    });
    Ok(())
}

/// `update_balance(cart, pay_amount)` (spec §4.4.4): subtracts from
/// balance, rejecting a payment that would push it negative. Computed
/// against the cart's balance as it stood immediately before this
/// payment, so the caller must invoke this before `Cart::recompute`
/// re-derives `balance` from the full payments list.
pub fn update_balance(balance_before: Money, pay_amount: Money) -> CoreResult<()> {
    if balance_before.cents() - pay_amount.cents() < 0 {
        return Err(CoreError::BalanceWouldGoNegative { balance: balance_before.cents(), amount: pay_amount.cents() });
    }
    Ok(())
}

/// `check_deposit_over(cart, deposit)` (spec §4.4.4): rejects a deposit
/// that exceeds balance when the strategy disallows over-deposit.
pub fn check_deposit_over(balance: Money, deposit: Money, caps: PaymentCapabilities) -> CoreResult<()> {
    if !caps.can_deposit_over && deposit.cents() > balance.cents() {
        return Err(CoreError::DepositOver { deposit: deposit.cents(), balance: balance.cents() });
    }
    Ok(())
}

/// `update_change(cart, payment)` (spec §4.4.4): for change-giving
/// methods, `change = deposit - balance` and the payment's booked
/// `amount` becomes `min(deposit, balance)`. Non-change methods keep the
/// full deposit as `amount` with zero change, even if that deposit
/// exceeds balance — callers must already have rejected over-deposit
/// through `check_deposit_over` for those methods.
pub fn update_change(balance_before: Money, payment: &mut Payment, caps: PaymentCapabilities) {
    if caps.can_change && payment.deposit_amount.cents() > balance_before.cents() {
        payment.change_amount = payment.deposit_amount - balance_before;
        payment.amount = balance_before;
    } else {
        payment.amount = payment.deposit_amount.max(Money::zero()).min_with(balance_before, caps.can_deposit_over);
    }
}

trait MoneyMinExt {
    fn min_with(self, balance: Money, can_deposit_over: bool) -> Money;
}

impl MoneyMinExt for Money {
    fn min_with(self, balance: Money, can_deposit_over: bool) -> Money {
        if can_deposit_over {
            self
        } else if self.cents() > balance.cents() {
            balance
        } else {
            self
        }
    }
}

/// `pay`/`refund` hooks a strategy runs beyond the shared helpers above.
/// Every payment code in this crate shares the identity behavior — the
/// shared helpers already implement the full §4.4.4 pipeline — so the
/// registry exists as the seam the spec's design note (§9) calls for
/// ("function-typed fields... avoid class hierarchies") without yet
/// needing a second implementation. A cash-drawer integration or a
/// store-credit method with side effects beyond the ledger would register
/// its own entry here instead of branching inside `apply_payment`.
pub type PayHook = fn(&mut pos_core::Cart, &Payment) -> CoreResult<()>;
pub type RefundHook = fn(&mut pos_core::Cart, &Payment) -> CoreResult<()>;

#[derive(Clone, Copy)]
pub struct PaymentStrategy {
    pub pay: PayHook,
    pub refund: RefundHook,
}

fn identity_hook(_cart: &mut pos_core::Cart, _payment: &Payment) -> CoreResult<()> {
    Ok(())
}

const GENERIC_STRATEGY: PaymentStrategy = PaymentStrategy { pay: identity_hook, refund: identity_hook };

/// Maps `payment_code -> PaymentStrategy`. Unknown codes fall through to
/// `GENERIC_STRATEGY` rather than failing — spec §4.4.4 has the *master*
/// reject unknown codes (via `MasterDataClient::get_payment_method`
/// returning not-found), not the registry.
#[derive(Default)]
pub struct PaymentRegistry {
    strategies: std::collections::HashMap<String, PaymentStrategy>,
}

impl PaymentRegistry {
    pub fn new() -> Self {
        PaymentRegistry::default()
    }

    pub fn register(&mut self, payment_code: impl Into<String>, strategy: PaymentStrategy) {
        self.strategies.insert(payment_code.into(), strategy);
    }

    pub fn resolve(&self, payment_code: &str) -> PaymentStrategy {
        self.strategies.get(payment_code).copied().unwrap_or(GENERIC_STRATEGY)
    }
}

/// Looks up capabilities for `payment_code` via the master-data cache and
/// runs the full payment pipeline: create → check-deposit-over → update
/// balance math → update-change → strategy hook, in that order (spec
/// §4.4.4). Does not call `Cart::recompute` — callers run the pricing
/// pipeline once after all payments in a batch are applied.
pub async fn apply_payment(
    cart: &mut pos_core::Cart,
    registry: &PaymentRegistry,
    caches: &mut pos_terminal::MasterDataCaches,
    client: &dyn pos_terminal::MasterDataClient,
    tenant_id: &str,
    payment_code: &str,
    deposit_amount: Money,
    detail: Option<String>,
) -> CartResult<()> {
    if cart.status != CartStatus::Paying {
        return Err(IoCartError::Core(CoreError::InvalidEvent {
            state: format!("{:?}", cart.status),
            event: "add_payment".to_string(),
        }));
    }

    let record = caches
        .payment_method(client, tenant_id, payment_code)
        .await
        .map_err(|_| IoCartError::UnknownPaymentMethod { payment_code: payment_code.to_string() })?;
    let caps = PaymentCapabilities::from(record.clone());
    let strategy = registry.resolve(payment_code);

    let balance_before = cart.balance;
    check_deposit_over(balance_before, deposit_amount, caps)?;
    create_payment(cart, payment_code, &record.name, deposit_amount, detail)?;

    let payment = cart.payments.last_mut().expect("just pushed");
    update_change(balance_before, payment, caps);
    update_balance(balance_before, payment.amount)?;
    (strategy.pay)(cart, cart.payments.last().expect("just pushed"))?;

    Ok(())
}

/// Runs a refund through the registered strategy's `refund` hook. The
/// ledger-level effect (negative-amount payment row on the return
/// transaction) is assembled by `void_return::build_return`; this hook is
/// for side effects a bespoke strategy needs beyond that, e.g. reversing
/// a store-credit balance.
pub fn apply_refund(cart: &mut pos_core::Cart, registry: &PaymentRegistry, payment: &Payment) -> CoreResult<()> {
    let strategy = registry.resolve(&payment.payment_code);
    (strategy.refund)(cart, payment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cash_caps() -> PaymentCapabilities {
        PaymentCapabilities { can_refund: true, can_deposit_over: true, can_change: true }
    }

    fn exact_caps() -> PaymentCapabilities {
        PaymentCapabilities { can_refund: true, can_deposit_over: false, can_change: false }
    }

    #[test]
    fn change_is_computed_for_change_giving_methods() {
        let mut payment = Payment {
            payment_no: 1,
            payment_code: "CASH".into(),
            description: "Cash".into(),
            deposit_amount: Money::from_cents(300),
            amount: Money::from_cents(300),
            change_amount: Money::zero(),
            detail: None,
        };
        update_change(Money::from_cents(200), &mut payment, cash_caps());
        assert_eq!(payment.amount.cents(), 200);
        assert_eq!(payment.change_amount.cents(), 100);
    }

    #[test]
    fn deposit_over_rejected_for_non_change_method() {
        let result = check_deposit_over(Money::from_cents(200), Money::from_cents(300), exact_caps());
        assert!(result.is_err());
    }

    #[test]
    fn balance_would_go_negative_is_rejected() {
        let result = update_balance(Money::from_cents(100), Money::from_cents(150));
        assert!(result.is_err());
    }
}
