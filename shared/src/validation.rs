//! Validation utilities for the Production Lot Engine
//!
//! Plain checks return `Result<(), &'static str>`; the `*_rule` variants wrap
//! them for `#[validate(custom = "...")]` on request types.

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::models::AlertThresholds;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate that a quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate that a quantity or amount is zero or more
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    Ok(())
}

/// Validate a percentage in the inclusive range 0-100
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate all thresholds of an inventory alert rule
pub fn validate_alert_thresholds(thresholds: &AlertThresholds) -> Result<(), &'static str> {
    validate_non_negative(thresholds.safety_stock_quantity)
        .map_err(|_| "Safety stock quantity cannot be negative")?;
    validate_non_negative(thresholds.reorder_point_quantity)
        .map_err(|_| "Reorder point quantity cannot be negative")?;
    validate_percentage(thresholds.alert_threshold_percentage)
}

// ============================================================================
// Identifier Validations
// ============================================================================

/// Validate lot number format (3-40 chars, uppercase alphanumeric and dashes)
pub fn validate_lot_number(lot_number: &str) -> Result<(), &'static str> {
    if lot_number.len() < 3 {
        return Err("Lot number must be at least 3 characters");
    }
    if lot_number.len() > 40 {
        return Err("Lot number must be at most 40 characters");
    }
    if !lot_number
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Lot number must be uppercase alphanumeric with dashes only");
    }
    if lot_number.starts_with('-') || lot_number.ends_with('-') {
        return Err("Lot number cannot start or end with a dash");
    }
    Ok(())
}

/// Validate a purchase order reference
pub fn validate_purchase_order_ref(reference: &str) -> Result<(), &'static str> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err("Purchase order reference cannot be empty");
    }
    if trimmed.len() > 64 {
        return Err("Purchase order reference must be at most 64 characters");
    }
    Ok(())
}

// ============================================================================
// validator adapters
// ============================================================================

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

pub fn positive_quantity_rule(value: &Decimal) -> Result<(), ValidationError> {
    validate_positive_quantity(*value).map_err(|m| rule_error("positive_quantity", m))
}

pub fn non_negative_rule(value: &Decimal) -> Result<(), ValidationError> {
    validate_non_negative(*value).map_err(|m| rule_error("non_negative", m))
}

pub fn percentage_rule(value: &Decimal) -> Result<(), ValidationError> {
    validate_percentage(*value).map_err(|m| rule_error("percentage", m))
}

pub fn lot_number_rule(value: &str) -> Result<(), ValidationError> {
    validate_lot_number(value).map_err(|m| rule_error("lot_number", m))
}

pub fn purchase_order_rule(value: &str) -> Result<(), ValidationError> {
    validate_purchase_order_ref(value).map_err(|m| rule_error("purchase_order", m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(Decimal::new(1, 3)).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(Decimal::from(-4)).is_err());
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(validate_percentage(Decimal::ZERO).is_ok());
        assert!(validate_percentage(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_percentage(Decimal::new(1005, 1)).is_err());
        assert!(validate_percentage(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_alert_thresholds() {
        let mut t = AlertThresholds {
            safety_stock_quantity: Decimal::from(10),
            reorder_point_quantity: Decimal::from(20),
            alert_threshold_percentage: Decimal::from(15),
        };
        assert!(validate_alert_thresholds(&t).is_ok());
        t.reorder_point_quantity = Decimal::from(-1);
        assert_eq!(
            validate_alert_thresholds(&t),
            Err("Reorder point quantity cannot be negative")
        );
    }

    #[test]
    fn test_lot_number() {
        assert!(validate_lot_number("PL-2026-00001").is_ok());
        assert!(validate_lot_number("PL").is_err());
        assert!(validate_lot_number("pl-2026").is_err());
        assert!(validate_lot_number("-PL2026").is_err());
        assert!(validate_lot_number("PL 2026").is_err());
    }

    #[test]
    fn test_purchase_order_ref() {
        assert!(validate_purchase_order_ref("PO-88812").is_ok());
        assert!(validate_purchase_order_ref("   ").is_err());
    }

    #[test]
    fn test_rule_adapters_carry_messages() {
        let err = positive_quantity_rule(&Decimal::ZERO).unwrap_err();
        assert_eq!(err.code, "positive_quantity");
        assert!(err.message.is_some());
    }
}
