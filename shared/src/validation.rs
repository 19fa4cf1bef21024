//! Validation utilities shared by the HTTP layer and the engine

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Validate stock thresholds: min ≥ 0 and max (if any) ≥ min
pub fn validate_stock_thresholds(min: Decimal, max: Option<Decimal>) -> DomainResult<()> {
    if min < Decimal::ZERO {
        return Err(DomainError::validation("min_stock", "Minimum stock cannot be negative"));
    }
    if let Some(max) = max {
        if max < min {
            return Err(DomainError::validation(
                "max_stock",
                "Maximum stock cannot be below minimum stock",
            ));
        }
    }
    Ok(())
}

/// Validate a unit of measure label (e.g. "kg", "liter", "pcs")
pub fn validate_unit(unit: &str) -> DomainResult<()> {
    let unit = unit.trim();
    if unit.is_empty() || unit.len() > 20 {
        return Err(DomainError::validation("unit", "Unit must be 1-20 characters"));
    }
    Ok(())
}

/// Validate a display name
pub fn validate_name(field: &str, name: &str) -> DomainResult<()> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 150 {
        return Err(DomainError::validation(field, "Name must be 1-150 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert!(validate_stock_thresholds(Decimal::ZERO, None).is_ok());
        assert!(validate_stock_thresholds(Decimal::from(5), Some(Decimal::from(10))).is_ok());
        assert!(validate_stock_thresholds(Decimal::from(-1), None).is_err());
        assert!(validate_stock_thresholds(Decimal::from(10), Some(Decimal::from(5))).is_err());
    }

    #[test]
    fn test_unit_and_name() {
        assert!(validate_unit("kg").is_ok());
        assert!(validate_unit("   ").is_err());
        assert!(validate_name("name", "Beras Medium").is_ok());
        assert!(validate_name("name", "").is_err());
    }
}
