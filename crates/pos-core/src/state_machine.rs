//! # Cart State Machine
//!
//! `CartStatus` is a tagged enum; legality of `(state, event)` pairs is
//! enforced by a static dispatch table rather than a class hierarchy (spec
//! §9 design note). The pricing pipeline (see `pricing`) runs after every
//! successful transition, never inside it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Initial,
    Idle,
    EnteringItem,
    Paying,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CartEvent {
    Create,
    AddItems,
    CancelLine,
    UnitPriceOverride,
    AddLineDiscount,
    AddSubtotalDiscount,
    Subtotal,
    AddPayment,
    /// Paying → EnteringItem, clearing all payments and restoring balance.
    ResumeItemEntry,
    Bill,
    CancelCart,
}

/// The dispatch table: `(state, event) -> next state`. `CancelCart` is
/// valid from every non-terminal state and is appended separately below
/// rather than repeated per row.
const TRANSITIONS: &[(CartStatus, CartEvent, CartStatus)] = &[
    (CartStatus::Initial, CartEvent::Create, CartStatus::Idle),
    (CartStatus::Idle, CartEvent::AddItems, CartStatus::EnteringItem),
    (CartStatus::EnteringItem, CartEvent::AddItems, CartStatus::EnteringItem),
    (CartStatus::EnteringItem, CartEvent::CancelLine, CartStatus::EnteringItem),
    (CartStatus::EnteringItem, CartEvent::UnitPriceOverride, CartStatus::EnteringItem),
    (CartStatus::EnteringItem, CartEvent::AddLineDiscount, CartStatus::EnteringItem),
    (CartStatus::EnteringItem, CartEvent::AddSubtotalDiscount, CartStatus::EnteringItem),
    (CartStatus::EnteringItem, CartEvent::Subtotal, CartStatus::Paying),
    (CartStatus::Paying, CartEvent::AddSubtotalDiscount, CartStatus::Paying),
    (CartStatus::Paying, CartEvent::AddPayment, CartStatus::Paying),
    (CartStatus::Paying, CartEvent::ResumeItemEntry, CartStatus::EnteringItem),
    (CartStatus::Paying, CartEvent::Bill, CartStatus::Completed),
];

/// Non-terminal states `cancel_cart` is reachable from (spec §4.4.1:
/// "Cancelled reachable from any non-terminal state").
const CANCELLABLE_FROM: &[CartStatus] = &[
    CartStatus::Initial,
    CartStatus::Idle,
    CartStatus::EnteringItem,
    CartStatus::Paying,
];

/// Looks up the next state for `(state, event)`, or returns
/// `CoreError::InvalidEvent` if the pair is not in the table.
pub fn transition(state: CartStatus, event: CartEvent) -> Result<CartStatus, CoreError> {
    if event == CartEvent::CancelCart {
        return if CANCELLABLE_FROM.contains(&state) {
            Ok(CartStatus::Cancelled)
        } else {
            Err(invalid(state, event))
        };
    }

    TRANSITIONS
        .iter()
        .find(|(s, e, _)| *s == state && *e == event)
        .map(|(_, _, next)| *next)
        .ok_or_else(|| invalid(state, event))
}

fn invalid(state: CartStatus, event: CartEvent) -> CoreError {
    CoreError::InvalidEvent {
        state: format!("{state:?}"),
        event: format!("{event:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path() {
        let mut s = CartStatus::Initial;
        s = transition(s, CartEvent::Create).unwrap();
        assert_eq!(s, CartStatus::Idle);
        s = transition(s, CartEvent::AddItems).unwrap();
        assert_eq!(s, CartStatus::EnteringItem);
        s = transition(s, CartEvent::Subtotal).unwrap();
        assert_eq!(s, CartStatus::Paying);
        s = transition(s, CartEvent::AddPayment).unwrap();
        assert_eq!(s, CartStatus::Paying);
        s = transition(s, CartEvent::Bill).unwrap();
        assert_eq!(s, CartStatus::Completed);
    }

    #[test]
    fn resume_item_entry_only_valid_from_paying() {
        assert!(transition(CartStatus::Paying, CartEvent::ResumeItemEntry).is_ok());
        assert!(transition(CartStatus::EnteringItem, CartEvent::ResumeItemEntry).is_err());
    }

    #[test]
    fn cancel_cart_reachable_from_any_non_terminal_state() {
        for s in [CartStatus::Initial, CartStatus::Idle, CartStatus::EnteringItem, CartStatus::Paying] {
            assert_eq!(transition(s, CartEvent::CancelCart).unwrap(), CartStatus::Cancelled);
        }
        assert!(transition(CartStatus::Completed, CartEvent::CancelCart).is_err());
        assert!(transition(CartStatus::Cancelled, CartEvent::CancelCart).is_err());
    }

    #[test]
    fn invalid_event_in_state_is_rejected() {
        assert!(transition(CartStatus::Completed, CartEvent::AddPayment).is_err());
        assert!(transition(CartStatus::Idle, CartEvent::Bill).is_err());
    }
}
