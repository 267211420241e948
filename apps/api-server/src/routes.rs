//! HTTP surface assembly (spec §6). Each submodule owns one resource
//! group; this file only wires method/path pairs to handlers.

pub mod account;
pub mod cart;
pub mod journal;
pub mod stock;
pub mod subscriber;
pub mod terminal;
pub mod transaction;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/accounts/token", post(account::issue_token))
        .route("/terminals", post(terminal::create_terminal))
        .route(
            "/terminals/:store_code/:terminal_no",
            get(terminal::get_terminal).delete(terminal::delete_terminal),
        )
        .route("/terminals/:store_code/:terminal_no/sign-in", post(terminal::sign_in))
        .route("/terminals/:store_code/:terminal_no/open", post(terminal::open_terminal))
        .route("/terminals/:store_code/:terminal_no/close", post(terminal::close_terminal))
        .route("/terminals/:store_code/:terminal_no/cash-in", post(terminal::cash_in))
        .route("/terminals/:store_code/:terminal_no/cash-out", post(terminal::cash_out))
        .route("/carts", post(cart::create_cart))
        .route("/carts/:cart_id/line-items", post(cart::add_line_items))
        .route("/carts/:cart_id/line-items/cancel", post(cart::cancel_line))
        .route("/carts/:cart_id/line-items/override-price", post(cart::override_unit_price))
        .route("/carts/:cart_id/line-items/discount", post(cart::add_line_discount))
        .route("/carts/:cart_id/subtotal-discount", post(cart::add_subtotal_discount))
        .route("/carts/:cart_id/subtotal", get(cart::subtotal))
        .route("/carts/:cart_id/payments", post(cart::add_payments))
        .route("/carts/:cart_id/resume-item-entry", post(cart::resume_item_entry))
        .route("/carts/:cart_id/cancel", post(cart::cancel_cart))
        .route("/carts/:cart_id/bill", post(cart::bill))
        .route("/transactions", get(transaction::list_transactions))
        .route("/transactions/:terminal_id/:transaction_no", get(transaction::get_transaction))
        .route("/transactions/:terminal_id/:transaction_no/void", post(transaction::void_transaction))
        .route("/transactions/:terminal_id/:transaction_no/return", post(transaction::return_transaction))
        .route("/stock/:store_code/:item_code", get(stock::get_stock))
        .route("/stock", get(stock::list_stock))
        .route("/stock/:store_code/:item_code/adjust", post(stock::update_stock))
        .route("/stock/:store_code/:item_code/history", get(stock::stock_history))
        .route("/stock/snapshots", get(stock::list_snapshots))
        .route("/stock/snapshots/trigger", post(stock::trigger_snapshot))
        .route("/stock/retention", put(stock::set_retention))
        .route("/stock/alerts/ws/:tenant_id", get(crate::ws::stock_alerts_ws))
        .route("/journal", get(journal::list_journal))
        .route("/journal/summary", get(journal::sales_summary))
        .route("/journal/sales-report", get(journal::sales_report))
        .route("/events/delivery-report", post(subscriber::report_delivery))
        .with_state(state)
}
