//! Validation utilities for the Warehouse Stock Management Platform
//!
//! Scalar and shape checks shared by the core services. Everything here is
//! pure; services translate the static messages into typed errors.

use rust_decimal::Decimal;

// ============================================================================
// Bounds
// ============================================================================

/// Upper bound for container and per-unit weights
pub const MAX_UNIT_WEIGHT: i64 = 9999;

/// Upper bound for units in a single packing run
pub const MAX_PACKING_UNITS: i64 = 99_999;

/// Allowed deviation when component percentages are summed
pub fn component_sum_tolerance() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate item code format (alphanumeric plus dash/underscore, max 64)
pub fn validate_item_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Item code must not be empty");
    }
    if code.len() > 64 {
        return Err("Item code must be at most 64 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Item code must be alphanumeric with dashes or underscores");
    }
    Ok(())
}

/// Validate a display name (non-blank, max 120 characters)
pub fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name must not be blank");
    }
    if trimmed.len() > 120 {
        return Err("Name must be at most 120 characters");
    }
    Ok(())
}

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate a strictly positive quantity
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a non-zero adjustment delta
pub fn validate_nonzero_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity == Decimal::ZERO {
        return Err("Quantity must not be zero");
    }
    Ok(())
}

/// Validate a per-unit or container weight (positive, bounded)
pub fn validate_unit_weight(weight: Decimal) -> Result<(), &'static str> {
    if weight <= Decimal::ZERO {
        return Err("Weight must be positive");
    }
    if weight > Decimal::from(MAX_UNIT_WEIGHT) {
        return Err("Weight exceeds the supported maximum");
    }
    Ok(())
}

/// Validate a packing unit count (positive, bounded)
pub fn validate_packing_units(units: i64) -> Result<(), &'static str> {
    if units <= 0 {
        return Err("Unit count must be positive");
    }
    if units > MAX_PACKING_UNITS {
        return Err("Unit count exceeds the supported maximum");
    }
    Ok(())
}

// ============================================================================
// Recipe Validations
// ============================================================================

/// Validate a production yield percentage (0 < yield <= 100)
pub fn validate_yield_percent(yield_percent: Decimal) -> Result<(), &'static str> {
    if yield_percent <= Decimal::ZERO || yield_percent > Decimal::from(100) {
        return Err("Yield must be between 0 and 100 percent");
    }
    Ok(())
}

/// Validate the shape of recipe component shares
///
/// At least one component, each share in (0, 100].
pub fn validate_component_shares(percents: &[Decimal]) -> Result<(), &'static str> {
    if percents.is_empty() {
        return Err("Recipe requires at least one component");
    }
    for p in percents {
        if *p <= Decimal::ZERO {
            return Err("Component percentages must be positive");
        }
        if *p > Decimal::from(100) {
            return Err("Component percentages cannot exceed 100");
        }
    }
    Ok(())
}

/// Validate that component shares sum to 100 within tolerance
pub fn validate_component_sum(percents: &[Decimal]) -> Result<(), &'static str> {
    let total: Decimal = percents.iter().sum();
    if (total - Decimal::from(100)).abs() > component_sum_tolerance() {
        return Err("Component percentages must sum to 100");
    }
    Ok(())
}

/// Validate recipe component percentages (shape and sum together)
pub fn validate_component_percents(percents: &[Decimal]) -> Result<(), &'static str> {
    validate_component_shares(percents)?;
    validate_component_sum(percents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    // ========================================================================
    // Catalog Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_item_code_valid() {
        assert!(validate_item_code("RAW-OAK-01").is_ok());
        assert!(validate_item_code("finished_500g").is_ok());
        assert!(validate_item_code("A").is_ok());
    }

    #[test]
    fn test_validate_item_code_invalid() {
        assert!(validate_item_code("").is_err());
        assert!(validate_item_code("has space").is_err());
        assert!(validate_item_code("semi/oak").is_err());
        assert!(validate_item_code(&"X".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Oak chips, medium toast").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"n".repeat(121)).is_err());
    }

    // ========================================================================
    // Quantity Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity(dec("0.001")).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(dec("-5")).is_err());
    }

    #[test]
    fn test_validate_nonzero_quantity() {
        assert!(validate_nonzero_quantity(dec("-3.5")).is_ok());
        assert!(validate_nonzero_quantity(dec("3.5")).is_ok());
        assert!(validate_nonzero_quantity(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_unit_weight_bounds() {
        assert!(validate_unit_weight(dec("0.5")).is_ok());
        assert!(validate_unit_weight(Decimal::from(9999)).is_ok());
        assert!(validate_unit_weight(Decimal::ZERO).is_err());
        assert!(validate_unit_weight(Decimal::from(10000)).is_err());
    }

    #[test]
    fn test_validate_packing_units_bounds() {
        assert!(validate_packing_units(1).is_ok());
        assert!(validate_packing_units(99_999).is_ok());
        assert!(validate_packing_units(0).is_err());
        assert!(validate_packing_units(100_000).is_err());
    }

    // ========================================================================
    // Recipe Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_yield_percent() {
        assert!(validate_yield_percent(dec("90")).is_ok());
        assert!(validate_yield_percent(dec("100")).is_ok());
        assert!(validate_yield_percent(dec("0.1")).is_ok());
        assert!(validate_yield_percent(Decimal::ZERO).is_err());
        assert!(validate_yield_percent(dec("100.01")).is_err());
    }

    #[test]
    fn test_validate_component_percents_exact() {
        assert!(validate_component_percents(&[dec("60"), dec("40")]).is_ok());
        assert!(validate_component_percents(&[dec("100")]).is_ok());
    }

    #[test]
    fn test_validate_component_percents_within_tolerance() {
        assert!(validate_component_percents(&[dec("60"), dec("40.005")]).is_ok());
        assert!(validate_component_percents(&[dec("60"), dec("39.995")]).is_ok());
    }

    #[test]
    fn test_validate_component_percents_outside_tolerance() {
        assert!(validate_component_percents(&[dec("60"), dec("39.98")]).is_err());
        assert!(validate_component_percents(&[dec("60"), dec("40.02")]).is_err());
    }

    #[test]
    fn test_validate_component_percents_shape() {
        assert!(validate_component_percents(&[]).is_err());
        assert!(validate_component_percents(&[dec("100"), dec("-0.0")]).is_err());
        assert!(validate_component_percents(&[dec("110"), dec("-10")]).is_err());
    }
}
