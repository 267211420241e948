//! # Void and Return (spec §4.4.6)
//!
//! Both operations mint a *new* transaction that references an existing
//! one through `origin`; neither ever mutates the original log. The
//! out-of-band `TransactionStatus` document (see `repository.rs`) is the
//! only thing that changes on the original transaction_no.

use chrono::Utc;
use pos_core::{Payment, StaffRef, TransactionLog, TransactionStatus, TransactionType};

use crate::error::{CartError, CartResult};

/// Builds the voiding transaction for `origin`. `origin.transaction_type`
/// decides whether the result is `VoidSales` or `VoidReturn` (voiding a
/// return), mirroring the original's payments and line items exactly —
/// voiding does not re-run the pricing pipeline, it restates the
/// original's numbers as the record of what was undone.
pub fn build_void(
    origin: &TransactionLog,
    new_transaction_no: i64,
    new_receipt_no: i64,
    staff: StaffRef,
    payments: Vec<Payment>,
) -> TransactionLog {
    let transaction_type = match origin.transaction_type {
        TransactionType::ReturnSales => TransactionType::VoidReturn,
        _ => TransactionType::VoidSales,
    };
    TransactionLog {
        transaction_no: new_transaction_no,
        receipt_no: new_receipt_no,
        transaction_type,
        generate_date_time: Utc::now(),
        origin: Some(origin.transaction_no),
        is_voided: false,
        is_refunded: false,
        staff,
        payments,
        ..origin.clone()
    }
}

/// Builds the return transaction for `origin`, negating amounts relative
/// to the original (spec §4.4.6: "`ReturnSales` with negative amounts
/// relative to the target").
pub fn build_return(
    origin: &TransactionLog,
    new_transaction_no: i64,
    new_receipt_no: i64,
    staff: StaffRef,
    refund_payments: Vec<Payment>,
) -> TransactionLog {
    TransactionLog {
        transaction_no: new_transaction_no,
        receipt_no: new_receipt_no,
        transaction_type: TransactionType::ReturnSales,
        generate_date_time: Utc::now(),
        origin: Some(origin.transaction_no),
        is_voided: false,
        is_refunded: false,
        staff,
        payments: refund_payments,
        total_amount: negate(origin.total_amount),
        total_amount_with_tax: negate(origin.total_amount_with_tax),
        total_discount_amount: negate(origin.total_discount_amount),
        tax_amount: negate(origin.tax_amount),
        total_quantity: -origin.total_quantity,
        line_items: origin.line_items.iter().cloned().map(negate_line).collect(),
        taxes: origin.taxes.iter().cloned().map(negate_tax).collect(),
        ..origin.clone()
    }
}

fn negate(m: pos_core::Money) -> pos_core::Money {
    pos_core::Money::from_cents(-m.cents())
}

fn negate_line(mut line: pos_core::CartLineItem) -> pos_core::CartLineItem {
    line.amount = negate(line.amount);
    line.quantity = -line.quantity;
    line
}

fn negate_tax(mut tax: pos_core::Tax) -> pos_core::Tax {
    tax.tax_amount = negate(tax.tax_amount);
    tax.target_amount = negate(tax.target_amount);
    tax.target_quantity = -tax.target_quantity;
    tax
}

/// Validates a void request against the current status overlay: rejects
/// if already voided, and rejects voiding a sale that has already been
/// refunded (spec §4.4.6 / end-to-end scenario 5: "Void-after-refund
/// blocked... Void of T1 must fail with AlreadyRefunded"). Voiding the
/// *return* transaction itself (T2 in that scenario) is a separate call
/// with T2's own status, which starts unrefunded and unvoided, so this
/// same function also covers "void of T2 succeeds".
pub fn validate_void(transaction_no: i64, current_status: Option<&TransactionStatus>) -> CartResult<()> {
    if let Some(status) = current_status {
        if status.is_voided {
            return Err(CartError::AlreadyVoided { transaction_no });
        }
        if status.is_refunded {
            return Err(CartError::AlreadyRefunded { transaction_no });
        }
    }
    Ok(())
}

/// Validates a return request: rejects if already refunded or already
/// voided (spec §4.4.6).
pub fn validate_return(transaction_no: i64, current_status: Option<&TransactionStatus>) -> CartResult<()> {
    if let Some(status) = current_status {
        if status.is_voided {
            return Err(CartError::AlreadyVoided { transaction_no });
        }
        if status.is_refunded {
            return Err(CartError::AlreadyRefunded { transaction_no });
        }
    }
    Ok(())
}

/// The status-doc update applied to the *original* transaction after a
/// successful void (spec §4.4.6: "Update the target's status doc
/// (`is_voided=true`, ...). Existing refund info is preserved.").
pub fn status_after_void(mut current: TransactionStatus, new_transaction_no: i64, staff_id: String) -> TransactionStatus {
    current.is_voided = true;
    current.void_transaction_no = Some(new_transaction_no);
    current.void_date_time = Some(Utc::now());
    current.void_staff_id = Some(staff_id);
    current
}

/// The status-doc update applied to the original after a successful
/// return.
pub fn status_after_return(mut current: TransactionStatus, new_transaction_no: i64, staff_id: String) -> TransactionStatus {
    current.is_refunded = true;
    current.return_transaction_no = Some(new_transaction_no);
    current.return_date_time = Some(Utc::now());
    current.return_staff_id = Some(staff_id);
    current
}

/// The status-doc update applied to a return's own status record when
/// *it* is voided — resets the return's refund fields on itself. The
/// original sale's status keeps its `is_refunded` as-is: the spec's
/// "resets the original's refund fields" (§4.4.6 "Void of a return")
/// refers to this return-of-a-return-target's bookkeeping, which callers
/// apply via `status_after_void` against the return's own transaction_no;
/// this helper additionally clears the sale-side refund linkage so a
/// subsequent `return` of the original sale is not blocked.
pub fn clear_refund_fields(mut status: TransactionStatus) -> TransactionStatus {
    status.is_refunded = false;
    status.return_transaction_no = None;
    status.return_date_time = None;
    status.return_staff_id = None;
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::Money;

    fn sample_origin(transaction_type: TransactionType) -> TransactionLog {
        TransactionLog {
            tenant_id: "A1234".into(),
            store_code: "S01".into(),
            terminal_id: "A1234-S01-1".into(),
            transaction_no: 100,
            receipt_no: 100,
            transaction_type,
            business_date: "20260727".into(),
            open_counter: 1,
            business_counter: 1,
            generate_date_time: Utc::now(),
            origin: None,
            is_voided: false,
            is_refunded: false,
            line_items: vec![],
            subtotal_discounts: vec![],
            payments: vec![],
            taxes: vec![],
            staff: StaffRef { staff_id: "st-1".into(), staff_name: None },
            total_amount: Money::from_cents(1000),
            total_amount_with_tax: Money::from_cents(1000),
            total_discount_amount: Money::zero(),
            total_quantity: 1,
            tax_amount: Money::zero(),
        }
    }

    #[test]
    fn void_of_normal_sale_produces_void_sales() {
        let origin = sample_origin(TransactionType::NormalSales);
        let voided = build_void(&origin, 200, 200, StaffRef { staff_id: "st-2".into(), staff_name: None }, vec![]);
        assert_eq!(voided.transaction_type, TransactionType::VoidSales);
        assert_eq!(voided.origin, Some(100));
    }

    #[test]
    fn void_of_return_produces_void_return() {
        let origin = sample_origin(TransactionType::ReturnSales);
        let voided = build_void(&origin, 200, 200, StaffRef { staff_id: "st-2".into(), staff_name: None }, vec![]);
        assert_eq!(voided.transaction_type, TransactionType::VoidReturn);
    }

    #[test]
    fn return_negates_amounts() {
        let origin = sample_origin(TransactionType::NormalSales);
        let returned = build_return(&origin, 201, 201, StaffRef { staff_id: "st-2".into(), staff_name: None }, vec![]);
        assert_eq!(returned.total_amount.cents(), -1000);
        assert_eq!(returned.total_quantity, -1);
    }

    #[test]
    fn already_voided_rejects_second_void() {
        let status = TransactionStatus { is_voided: true, ..Default::default() };
        assert!(matches!(validate_void(100, Some(&status)), Err(CartError::AlreadyVoided { transaction_no: 100 })));
    }

    #[test]
    fn already_refunded_rejects_second_return() {
        let status = TransactionStatus { is_refunded: true, ..Default::default() };
        assert!(matches!(validate_return(100, Some(&status)), Err(CartError::AlreadyRefunded { transaction_no: 100 })));
    }

    #[test]
    fn void_of_refunded_sale_is_blocked() {
        let status = TransactionStatus { is_refunded: true, ..Default::default() };
        assert!(matches!(validate_void(100, Some(&status)), Err(CartError::AlreadyRefunded { transaction_no: 100 })));
    }
}
