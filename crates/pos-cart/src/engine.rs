//! # Cart Engine (C4) — I/O Orchestration
//!
//! Wraps the pure `pos_core::Cart` aggregate with everything spec §4.4
//! needs that isn't pure math: storage persistence, the per-cart lock
//! (§5), the master-data read-through cache (§4.3), receipt/transaction
//! number allocation (§4.2), payment-strategy dispatch (§4.4.4), and
//! publication to the event pipeline on finalization (§4.4.5).
//!
//! One `CartEngine` is shared process-wide (it only holds pooled handles);
//! the caches it hands out per `cart_id` are the only per-cart state it
//! keeps, matching §4.3's "per cart instance, not shared across requests".

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use mongodb::ClientSession;
use pos_core::{
    Cart, CartEvent, CartLineItem, CartStatus, CoreError, Discount, DiscountType, Money, Payment, RoundingMethod,
    StaffRef, TaxRule, TransactionLog, TransactionType,
};
use pos_events::Publisher;
use pos_storage::{StorageError, StorageGateway};
use pos_terminal::{MasterDataCaches, MasterDataClient};
use tracing::{info, instrument};

use crate::error::{CartError, CartResult};
use crate::locking::CartLocks;
use crate::payment::{self, PaymentRegistry};
use crate::repository;
use crate::void_return;

/// Known transaction-log subscribers (spec §4.5.1). Open/close and
/// cash-in/out events use their own topics with their own lists; the cart
/// engine only ever publishes transaction logs, so only this one is
/// needed here.
const TRANLOG_SUBSCRIBERS: &[&str] = &["stock", "journal"];
const TRANLOG_TOPIC: &str = "topic-tranlog";

pub struct CartEngineConfig {
    pub rounding: RoundingMethod,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
}

impl Default for CartEngineConfig {
    fn default() -> Self {
        CartEngineConfig { rounding: RoundingMethod::HalfUp, cache_enabled: true, cache_ttl_seconds: 60 }
    }
}

pub struct CartEngine {
    storage: StorageGateway,
    client: Arc<dyn MasterDataClient>,
    publisher: Publisher,
    locks: Arc<dyn CartLocks>,
    payments: PaymentRegistry,
    config: CartEngineConfig,
    /// Per-cart-instance master-data caches (spec §4.3), thrown away once
    /// a cart reaches `Completed`/`Cancelled`.
    caches: Mutex<HashMap<String, MasterDataCaches>>,
}

impl CartEngine {
    pub fn new(
        storage: StorageGateway,
        client: Arc<dyn MasterDataClient>,
        publisher: Publisher,
        locks: Arc<dyn CartLocks>,
        payments: PaymentRegistry,
        config: CartEngineConfig,
    ) -> Self {
        CartEngine { storage, client, publisher, locks, payments, config, caches: Mutex::new(HashMap::new()) }
    }

    fn take_cache(&self, cart_id: &str) -> MasterDataCaches {
        let mut caches = self.caches.lock().unwrap();
        caches
            .remove(cart_id)
            .unwrap_or_else(|| MasterDataCaches::new(self.config.cache_enabled, self.config.cache_ttl_seconds))
    }

    fn return_cache(&self, cart_id: &str, cache: MasterDataCaches) {
        self.caches.lock().unwrap().insert(cart_id.to_string(), cache);
    }

    fn drop_cache(&self, cart_id: &str) {
        self.caches.lock().unwrap().remove(cart_id);
    }

    /// Fetches the tax rules for every distinct `tax_code` on the cart's
    /// current line items, via the per-cart cache.
    async fn tax_rules_for(&self, cart: &Cart, cache: &mut MasterDataCaches, tenant_id: &str) -> CartResult<HashMap<String, TaxRule>> {
        let mut rules = HashMap::new();
        for code in cart.line_items.iter().filter_map(|l| l.tax_code.as_ref()) {
            if rules.contains_key(code) {
                continue;
            }
            let record = cache.tax(self.client.as_ref(), tenant_id, code).await?;
            rules.insert(
                code.clone(),
                TaxRule {
                    tax_code: record.tax_code.clone(),
                    tax_name: record.tax_code.clone(),
                    tax_type: if record.kind.eq_ignore_ascii_case("internal") {
                        pos_core::TaxKind::Internal
                    } else {
                        pos_core::TaxKind::External
                    },
                    rate: pos_core::TaxRate::from_bps(record.rate_bps),
                    rounding_digit: 0,
                    rounding_method: self.config.rounding,
                },
            );
        }
        Ok(rules)
    }

    async fn recompute_and_save(&self, cart: &mut Cart, tenant_id: &str, cache: &mut MasterDataCaches) -> CartResult<()> {
        let rules = self.tax_rules_for(cart, cache, tenant_id).await?;
        cart.recompute(&rules, self.config.rounding)?;
        repository::save_cart(&self.storage, cart).await?;
        Ok(())
    }

    fn line_mut<'a>(cart: &'a mut Cart, line_no: u32) -> CartResult<&'a mut CartLineItem> {
        cart.line_items
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| CartError::Core(CoreError::UnknownPaymentCode(format!("line {line_no}"))))
    }

    // -----------------------------------------------------------------
    // Lifecycle (spec §4.4.1)
    // -----------------------------------------------------------------

    #[instrument(skip(self, staff))]
    pub async fn create_cart(&self, terminal_id: &str, cart_id: &str, staff: Option<StaffRef>) -> CartResult<Cart> {
        let mut cart = Cart::new_with_shard_key(cart_id, terminal_id.to_string());
        cart.apply_event(CartEvent::Create)?;
        cart.staff = staff;
        repository::save_cart(&self.storage, &cart).await?;
        info!(cart_id, terminal_id, "cart created");
        Ok(cart)
    }

    #[instrument(skip(self, items))]
    pub async fn add_items(&self, tenant_id: &str, cart_id: &str, items: Vec<NewLineItem>) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        let mut cache = self.take_cache(cart_id);

        for item in items {
            let record = cache.item(self.client.as_ref(), tenant_id, &item.item_code).await?;
            let unit_price = item.unit_price_override.unwrap_or(Money::from_cents(record.unit_price));
            let line_no = cart.next_line_no();
            let mut line = CartLineItem::new(line_no, record.item_code.clone(), record.name.clone(), unit_price, item.quantity);
            line.tax_code = record.tax_code.clone();
            line.is_discount_restricted = record.is_discount_restricted;
            if item.unit_price_override.is_some() {
                line.is_unit_price_changed = true;
                line.unit_price_original = Money::from_cents(record.unit_price);
            }
            cart.line_items.push(line);
            cart.apply_event(CartEvent::AddItems)?;
        }

        self.recompute_and_save(&mut cart, tenant_id, &mut cache).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn cancel_line(&self, tenant_id: &str, cart_id: &str, line_no: u32) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::CancelLine)?;
        Self::line_mut(&mut cart, line_no)?.is_cancelled = true;

        let mut cache = self.take_cache(cart_id);
        self.recompute_and_save(&mut cart, tenant_id, &mut cache).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn override_unit_price(&self, tenant_id: &str, cart_id: &str, line_no: u32, new_price: Money) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::UnitPriceOverride)?;
        let line = Self::line_mut(&mut cart, line_no)?;
        line.unit_price = new_price;
        line.is_unit_price_changed = true;

        let mut cache = self.take_cache(cart_id);
        self.recompute_and_save(&mut cart, tenant_id, &mut cache).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    #[instrument(skip(self, detail))]
    pub async fn add_line_discount(
        &self,
        tenant_id: &str,
        cart_id: &str,
        line_no: u32,
        discount_type: DiscountType,
        value: i64,
        detail: Option<String>,
    ) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::AddLineDiscount)?;
        cart.set_line_discount(line_no, Discount { seq_no: 1, discount_type, value, amount: Money::zero(), detail })?;

        let mut cache = self.take_cache(cart_id);
        self.recompute_and_save(&mut cart, tenant_id, &mut cache).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    #[instrument(skip(self, detail))]
    pub async fn add_subtotal_discount(
        &self,
        tenant_id: &str,
        cart_id: &str,
        discount_type: DiscountType,
        value: i64,
        detail: Option<String>,
    ) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::AddSubtotalDiscount)?;
        cart.set_subtotal_discounts(vec![Discount { seq_no: 1, discount_type, value, amount: Money::zero(), detail }])?;

        let mut cache = self.take_cache(cart_id);
        self.recompute_and_save(&mut cart, tenant_id, &mut cache).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn subtotal(&self, tenant_id: &str, cart_id: &str) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::Subtotal)?;

        let mut cache = self.take_cache(cart_id);
        self.recompute_and_save(&mut cart, tenant_id, &mut cache).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    /// Applies one or more payments in sequence. Payments in the same
    /// batch are not independent: the pricing pipeline re-runs after each
    /// one so the next sees the updated balance (spec §4.4.4).
    #[instrument(skip(self, payments))]
    pub async fn add_payments(&self, tenant_id: &str, cart_id: &str, payments: Vec<NewPayment>) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        let mut cache = self.take_cache(cart_id);

        for p in payments {
            cart.apply_event(CartEvent::AddPayment)?;
            payment::apply_payment(&mut cart, &self.payments, &mut cache, self.client.as_ref(), tenant_id, &p.payment_code, p.deposit_amount, p.detail)
                .await?;
            let rules = self.tax_rules_for(&cart, &mut cache, tenant_id).await?;
            cart.recompute(&rules, self.config.rounding)?;
        }

        repository::save_cart(&self.storage, &cart).await?;
        self.return_cache(cart_id, cache);
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn resume_item_entry(&self, cart_id: &str) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::ResumeItemEntry)?;
        // `apply_event` already cleared `payments`; line items (and so
        // `total_amount_with_tax`) are untouched by this transition, so the
        // balance simply reverts to the pre-payment total.
        cart.balance = cart.total_amount_with_tax;
        repository::save_cart(&self.storage, &cart).await?;
        Ok(cart)
    }

    #[instrument(skip(self))]
    pub async fn cancel_cart(&self, cart_id: &str) -> CartResult<Cart> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;
        cart.apply_event(CartEvent::CancelCart)?;
        repository::save_cart(&self.storage, &cart).await?;
        self.drop_cache(cart_id);
        Ok(cart)
    }

    // -----------------------------------------------------------------
    // Finalization (spec §4.4.5)
    // -----------------------------------------------------------------

    /// Finalizes a cart at `balance == 0`: draws receipt/transaction
    /// numbers, builds the transaction log, writes it alongside a journal
    /// record inside one storage transaction, publishes the event, then
    /// commits. Counter consumption is drawn and committed before the
    /// storage transaction even opens, so it is never rolled back even if
    /// a later step fails — gaps in `transaction_no` are expected.
    #[instrument(skip(self))]
    pub async fn bill(
        &self,
        tenant_id: &str,
        store_code: &str,
        terminal_id: &str,
        cart_id: &str,
        business_date: &str,
        open_counter: i64,
        business_counter: i64,
    ) -> CartResult<TransactionLog> {
        let _guard = self.locks.acquire(cart_id).await?;
        let mut cart = repository::load_cart(&self.storage, cart_id).await?;

        if cart.status != CartStatus::Paying {
            return Err(CartError::Core(CoreError::NotReadyToFinalize));
        }
        if cart.balance.cents() != 0 {
            return Err(CartError::NotReadyToFinalize { cart_id: cart_id.to_string(), balance: cart.balance.cents() });
        }

        let (receipt_no, transaction_no) = pos_terminal::next_receipt_and_transaction_no(&self.storage, terminal_id).await?;

        let staff = cart.staff.clone().unwrap_or(StaffRef { staff_id: "unknown".to_string(), staff_name: None });
        let log = TransactionLog {
            tenant_id: tenant_id.to_string(),
            store_code: store_code.to_string(),
            terminal_id: terminal_id.to_string(),
            transaction_no,
            receipt_no,
            transaction_type: TransactionType::NormalSales,
            business_date: business_date.to_string(),
            open_counter,
            business_counter,
            generate_date_time: Utc::now(),
            origin: None,
            is_voided: false,
            is_refunded: false,
            line_items: cart.line_items.clone(),
            subtotal_discounts: cart.subtotal_discounts.clone(),
            payments: cart.payments.clone(),
            taxes: cart.taxes.clone(),
            staff,
            total_amount: cart.total_amount,
            total_amount_with_tax: cart.total_amount_with_tax,
            total_discount_amount: cart.total_discount_amount,
            total_quantity: cart.total_quantity,
            tax_amount: cart.tax_amount,
        };

        let mut session = self.storage.start_transaction().await?;
        match self.write_transaction_and_journal(&mut session, &log).await {
            Ok(()) => {
                let event_id = self.publisher.publish(TRANLOG_TOPIC, TRANLOG_SUBSCRIBERS, serde_json::json!(&log)).await?;
                self.storage.commit(&mut session).await?;
                info!(cart_id, transaction_no, receipt_no, event_id, "cart finalized");
            }
            Err(e) => {
                self.storage.abort(&mut session).await?;
                return Err(e);
            }
        }

        cart.apply_event(CartEvent::Bill)?;
        repository::save_cart(&self.storage, &cart).await?;
        self.drop_cache(cart_id);

        Ok(log)
    }

    /// Writes the transaction log and its journal counterpart as one
    /// session-scoped pair of inserts, bypassing the gateway's generic
    /// contract operations (which are not session-aware) so both land or
    /// neither does (spec §4.4.5 step 3, §4.1 `start_transaction`).
    async fn write_transaction_and_journal(&self, session: &mut ClientSession, log: &TransactionLog) -> CartResult<()> {
        let doc = bson::to_document(log).map_err(|e| StorageError::Internal(e.to_string()))?;
        self.storage
            .db()
            .collection::<bson::Document>("transaction_logs")
            .insert_one(doc.clone())
            .session(&mut *session)
            .await
            .map_err(StorageError::from)?;
        self.storage
            .db()
            .collection::<bson::Document>("journal_entries")
            .insert_one(doc)
            .session(&mut *session)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Void / Return (spec §4.4.6)
    // -----------------------------------------------------------------

    #[instrument(skip(self, payments))]
    pub async fn void_transaction(
        &self,
        terminal_id: &str,
        target_transaction_no: i64,
        staff: StaffRef,
        payments: Vec<Payment>,
    ) -> CartResult<TransactionLog> {
        let origin = repository::load_transaction_log(&self.storage, terminal_id, target_transaction_no).await?;
        let current_status = repository::load_transaction_status(&self.storage, terminal_id, target_transaction_no).await?;
        void_return::validate_void(target_transaction_no, current_status.as_ref())?;

        let (receipt_no, new_transaction_no) = pos_terminal::next_receipt_and_transaction_no(&self.storage, terminal_id).await?;
        let voided = void_return::build_void(&origin, new_transaction_no, receipt_no, staff.clone(), payments);

        repository::insert_transaction_log(&self.storage, &voided).await?;
        self.publisher.publish(TRANLOG_TOPIC, TRANLOG_SUBSCRIBERS, serde_json::json!(&voided)).await?;

        let updated_status = void_return::status_after_void(current_status.unwrap_or_default(), new_transaction_no, staff.staff_id);
        repository::upsert_transaction_status(&self.storage, terminal_id, target_transaction_no, &updated_status).await?;

        info!(target_transaction_no, new_transaction_no, "transaction voided");
        Ok(voided)
    }

    #[instrument(skip(self, refund_payments))]
    pub async fn return_transaction(
        &self,
        terminal_id: &str,
        target_transaction_no: i64,
        staff: StaffRef,
        refund_payments: Vec<Payment>,
    ) -> CartResult<TransactionLog> {
        let origin = repository::load_transaction_log(&self.storage, terminal_id, target_transaction_no).await?;
        let current_status = repository::load_transaction_status(&self.storage, terminal_id, target_transaction_no).await?;
        void_return::validate_return(target_transaction_no, current_status.as_ref())?;

        let (receipt_no, new_transaction_no) = pos_terminal::next_receipt_and_transaction_no(&self.storage, terminal_id).await?;
        let returned = void_return::build_return(&origin, new_transaction_no, receipt_no, staff.clone(), refund_payments);

        repository::insert_transaction_log(&self.storage, &returned).await?;
        self.publisher.publish(TRANLOG_TOPIC, TRANLOG_SUBSCRIBERS, serde_json::json!(&returned)).await?;

        let updated_status = void_return::status_after_return(current_status.unwrap_or_default(), new_transaction_no, staff.staff_id);
        repository::upsert_transaction_status(&self.storage, terminal_id, target_transaction_no, &updated_status).await?;

        info!(target_transaction_no, new_transaction_no, "transaction returned");
        Ok(returned)
    }

    pub async fn read_transaction(&self, terminal_id: &str, transaction_no: i64) -> CartResult<TransactionLog> {
        repository::read_with_status_overlay(&self.storage, terminal_id, transaction_no).await
    }
}

/// Request-shaped input for `add_items` — the HTTP layer maps its
/// camelCase JSON body onto this before calling the engine.
pub struct NewLineItem {
    pub item_code: String,
    pub quantity: i64,
    pub unit_price_override: Option<Money>,
}

pub struct NewPayment {
    pub payment_code: String,
    pub deposit_amount: Money,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_line_item_and_payment_are_plain_data() {
        let item = NewLineItem { item_code: "SKU-1".into(), quantity: 2, unit_price_override: None };
        assert_eq!(item.quantity, 2);
        let payment = NewPayment { payment_code: "CASH".into(), deposit_amount: Money::from_cents(100), detail: None };
        assert_eq!(payment.deposit_amount.cents(), 100);
    }
}
