//! Validation utilities for the ERP back-office

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Longest accepted stock movement reason
pub const MAX_REASON_LEN: usize = 100;

/// Longest accepted product reference
pub const MAX_REFERENCE_LEN: usize = 50;

// ============================================================================
// Catalogue Validations
// ============================================================================

/// Validate a product reference after normalisation
/// Accepts uppercase letters, digits, '-', '_' and '.'
pub fn validate_reference(reference: &str) -> Result<(), &'static str> {
    if reference.is_empty() {
        return Err("Reference is required");
    }
    if reference.chars().count() > MAX_REFERENCE_LEN {
        return Err("Reference must be at most 50 characters");
    }
    if !reference
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err("Reference may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

/// Validate a unit price (strictly positive)
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price <= Decimal::ZERO {
        return Err("Price must be greater than zero");
    }
    Ok(())
}

/// Validate min/max stock thresholds
pub fn validate_stock_thresholds(min_stock: i32, max_stock: i32) -> Result<(), &'static str> {
    if min_stock < 0 {
        return Err("Minimum stock cannot be negative");
    }
    if max_stock < min_stock {
        return Err("Maximum stock must be greater than or equal to minimum stock");
    }
    Ok(())
}

/// Validate a stock level written directly (initial stock, adjustment)
pub fn validate_stock_level(level: i32) -> Result<(), &'static str> {
    if level < 0 {
        return Err("Stock cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Order and Stock Validations
// ============================================================================

/// Validate an order line quantity
pub fn validate_line_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be at least 1");
    }
    Ok(())
}

/// Validate a stock movement reason (1-100 characters after trimming)
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err("Reason is required");
    }
    if trimmed.chars().count() > MAX_REASON_LEN {
        return Err("Reason must be at most 100 characters");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate a required free-text field
pub fn validate_required(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("This field is required");
    }
    Ok(())
}

/// Validate that a period does not end before it starts
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    if end < start {
        return Err("End date must be on or after start date");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("P-HYDR-001").is_ok());
        assert!(validate_reference("VALVE_2.5").is_ok());
        assert!(validate_reference("").is_err());
        assert!(validate_reference("p-lower").is_err());
        assert!(validate_reference("A B").is_err());
        assert!(validate_reference(&"X".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(Decimal::from_str("0.01").unwrap()).is_ok());
        assert!(validate_price(Decimal::ZERO).is_err());
        assert!(validate_price(Decimal::from(-3)).is_err());
    }

    #[test]
    fn test_validate_stock_thresholds() {
        assert!(validate_stock_thresholds(5, 100).is_ok());
        assert!(validate_stock_thresholds(0, 0).is_ok());
        assert!(validate_stock_thresholds(-1, 10).is_err());
        assert!(validate_stock_thresholds(10, 5).is_err());
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-2).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("Inventory count").is_ok());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"r".repeat(100)).is_ok());
        assert!(validate_reason(&"r".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        assert!(validate_date_range(a, b).is_ok());
        assert!(validate_date_range(a, a).is_ok());
        assert!(validate_date_range(b, a).is_err());
    }
}
