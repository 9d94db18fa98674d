//! Validation utilities for the production inventory platform

use rust_decimal::Decimal;

use crate::models::{Item, ItemType};

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate SKU format (2-100 chars, uppercase alphanumeric plus `-` and `_`)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 2 {
        return Err("SKU must be at least 2 characters");
    }
    if sku.len() > 100 {
        return Err("SKU must be at most 100 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("SKU must be uppercase alphanumeric, '-' or '_'");
    }
    Ok(())
}

/// Validate a unit of measure label
pub fn validate_unit_of_measure(unit: &str) -> Result<(), &'static str> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err("Unit of measure is required");
    }
    if unit.len() > 50 {
        return Err("Unit of measure must be at most 50 characters");
    }
    Ok(())
}

/// Validate that a price is not negative
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Validate a quantity that must be strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

// ============================================================================
// BOM Validations
// ============================================================================

/// Validate that an item may be the output of a BOM entry
pub fn validate_bom_output(item_type: ItemType) -> Result<(), &'static str> {
    if !item_type.is_producible() {
        return Err("Raw materials cannot be an output item in a BOM");
    }
    Ok(())
}

/// Validate a BOM entry's output/input pair and ratio
pub fn validate_bom_entry(output: &Item, input: &Item, quantity_required: Decimal) -> Result<(), &'static str> {
    if output.id == input.id {
        return Err("An item cannot be a component of itself");
    }
    validate_bom_output(output.item_type)?;
    if quantity_required <= Decimal::ZERO {
        return Err("Quantity required must be positive");
    }
    Ok(())
}

/// Validate an alternative group name (optional, 1-50 chars when present)
pub fn validate_alternative_group(group: Option<&str>) -> Result<(), &'static str> {
    match group {
        None => Ok(()),
        Some(g) if g.trim().is_empty() => Err("Alternative group must not be blank"),
        Some(g) if g.len() > 50 => Err("Alternative group must be at most 50 characters"),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(item_type: ItemType) -> Item {
        Item {
            id: Uuid::new_v4(),
            sku: "TEST-1".to_string(),
            name: "Test".to_string(),
            description: None,
            item_type,
            unit_of_measure: "pcs".to_string(),
            quantity: Decimal::ZERO,
            minimum_stock_level: Decimal::ZERO,
            purchase_price: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            dealer_price: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_sku_valid() {
        assert!(validate_sku("TH-100").is_ok());
        assert!(validate_sku("PCB_MAIN_V2").is_ok());
    }

    #[test]
    fn test_validate_sku_invalid() {
        assert!(validate_sku("A").is_err()); // Too short
        assert!(validate_sku("th-100").is_err()); // Lowercase
        assert!(validate_sku("TH 100").is_err()); // Space
        assert!(validate_sku(&"A".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_unit_of_measure() {
        assert!(validate_unit_of_measure("kg").is_ok());
        assert!(validate_unit_of_measure("  ").is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_self_reference_rejected() {
        let output = item(ItemType::Final);
        assert_eq!(
            validate_bom_entry(&output, &output, Decimal::ONE),
            Err("An item cannot be a component of itself")
        );
    }

    #[test]
    fn test_raw_output_rejected() {
        let output = item(ItemType::Raw);
        let input = item(ItemType::Raw);
        assert!(validate_bom_entry(&output, &input, Decimal::ONE).is_err());
    }

    #[test]
    fn test_non_positive_ratio_rejected() {
        let output = item(ItemType::Intermediate);
        let input = item(ItemType::Raw);
        assert!(validate_bom_entry(&output, &input, Decimal::ZERO).is_err());
        assert!(validate_bom_entry(&output, &input, Decimal::new(5, 1)).is_ok());
    }

    #[test]
    fn test_validate_alternative_group() {
        assert!(validate_alternative_group(None).is_ok());
        assert!(validate_alternative_group(Some("display")).is_ok());
        assert!(validate_alternative_group(Some(" ")).is_err());
    }
}
