//! # Validation Module
//!
//! Business-rule validation for the cart engine's inputs (spec §4.4.3).
//! Type-level deserialization validation happens at the HTTP boundary; this
//! module covers the rules that depend on cart state.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{DiscountType, TaxRate};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// A positive line/payment quantity or amount, rejecting zero and negative.
pub fn validate_positive_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity".into() });
    }
    Ok(())
}

/// Non-negative unit price (zero is a valid free item).
pub fn validate_price(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".into(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// A positive payment amount.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive { field: "payment amount".into() });
    }
    Ok(())
}

/// `DiscountPercentage requires 0 ≤ value ≤ 100` (spec §4.4.3).
pub fn validate_discount_value(discount_type: DiscountType, value: i64) -> ValidationResult<()> {
    match discount_type {
        DiscountType::Percentage => {
            if !(0..=100).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: "discount_percentage".into(),
                    min: 0,
                    max: 100,
                });
            }
        }
        DiscountType::Amount => {
            if value < 0 {
                return Err(ValidationError::MustBePositive { field: "discount_amount".into() });
            }
        }
    }
    Ok(())
}

/// A tax rate in basis points must lie within [0, 10000] (0%-100%).
pub fn validate_tax_rate_bps(rate: TaxRate) -> ValidationResult<()> {
    if rate.bps() > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".into(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

pub fn validate_non_empty(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field: field.to_string() });
    }
    Ok(())
}

/// A tenant identifier is one uppercase letter followed by four digits
/// (spec §3, e.g. `A1234`) — the storage gateway interpolates it directly
/// into a database name, so this is checked wherever a tenant is first
/// provisioned (the admin CLI, terminal creation) rather than re-checked on
/// every request.
pub fn validate_tenant_id(tenant_id: &str) -> ValidationResult<()> {
    let mut chars = tenant_id.chars();
    let ok = tenant_id.len() == 5
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.clone().all(|c| c.is_ascii_digit())
        && chars.count() == 4;
    if !ok {
        return Err(ValidationError::InvalidFormat {
            field: "tenant_id".to_string(),
            reason: "must be one uppercase letter followed by four digits, e.g. A1234".to_string(),
        });
    }
    Ok(())
}

/// Validates the resolved discount amount does not exceed what it is
/// discounting from — shared by line-item and subtotal `DiscountAmount`
/// checks (spec §4.4.3: "fails if amount < value").
pub fn validate_discount_amount_within(amount: Money, ceiling: Money) -> bool {
    ceiling.cents() >= amount.cents()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_bounds() {
        assert!(validate_discount_value(DiscountType::Percentage, 0).is_ok());
        assert!(validate_discount_value(DiscountType::Percentage, 100).is_ok());
        assert!(validate_discount_value(DiscountType::Percentage, 101).is_err());
        assert!(validate_discount_value(DiscountType::Percentage, -1).is_err());
    }

    #[test]
    fn amount_discount_rejects_negative() {
        assert!(validate_discount_value(DiscountType::Amount, -1).is_err());
        assert!(validate_discount_value(DiscountType::Amount, 0).is_ok());
    }

    #[test]
    fn tax_rate_rejects_over_100_percent() {
        assert!(validate_tax_rate_bps(TaxRate::from_bps(10_000)).is_ok());
        assert!(validate_tax_rate_bps(TaxRate::from_bps(10_001)).is_err());
    }

    #[test]
    fn tenant_id_accepts_letter_plus_four_digits() {
        assert!(validate_tenant_id("A1234").is_ok());
        assert!(validate_tenant_id("a1234").is_err());
        assert!(validate_tenant_id("A123").is_err());
        assert!(validate_tenant_id("A12345").is_err());
        assert!(validate_tenant_id("1234A").is_err());
    }
}
