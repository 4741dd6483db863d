//! # Validation Module
//!
//! Input validation rules for inventory records and ledger requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (apps/api)                                     │
//! │  ├── JSON shape, required keys, allow-listed update fields             │
//! │  └── Decimal price text → Money                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any lock is taken)                       │
//! │  ├── Key lengths, names, categories                                    │
//! │  └── Quantities, prices, line counts, months                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity_available >= 0)                                   │
//! │  ├── PRIMARY KEY (sku, batch_number)                                   │
//! │  └── Foreign keys from lines to inventory                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use apotek_core::validation::{validate_sku, validate_line_quantity};
//!
//! validate_sku("PARA500").unwrap();
//! validate_line_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{InventoryUpdate, LineRequest, NewInventory};
use crate::{MAX_LINE_QUANTITY, MAX_TRANSACTION_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Column widths of the inventory table.
pub const MAX_SKU_LEN: usize = 100;
pub const MAX_BATCH_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_CATEGORY_LEN: usize = 50;
pub const MAX_SEARCH_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
/// - No whitespace or `/` (the key is used in URL paths)
///
/// ## Example
/// ```rust
/// use apotek_core::validation::validate_sku;
///
/// assert!(validate_sku("TEST001").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A/B").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    required_text("sku", sku, MAX_SKU_LEN)?;
    reject_path_characters("sku", sku)
}

/// Validates a batch number. Same shape rules as a SKU, 50 characters.
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    required_text("batch_number", batch_number, MAX_BATCH_LEN)?;
    reject_path_characters("batch_number", batch_number)
}

fn reject_path_characters(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace or '/'".to_string(),
        });
    }
    Ok(())
}

/// Validates a display name.
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    required_text("nama_item", name, MAX_NAME_LEN)
}

/// Validates an optional category. Empty is treated as absent by callers.
pub fn validate_category(category: &str) -> ValidationResult<()> {
    if category.trim().chars().count() > MAX_CATEGORY_LEN {
        return Err(ValidationError::TooLong {
            field: "kategori".to_string(),
            max: MAX_CATEGORY_LEN,
        });
    }
    Ok(())
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the quantity of one transaction line.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
///
/// ## Example
/// ```rust
/// use apotek_core::validation::validate_line_quantity;
///
/// assert!(validate_line_quantity(5).is_ok());
/// assert!(validate_line_quantity(0).is_err());
/// assert!(validate_line_quantity(-3).is_err());
/// ```
pub fn validate_line_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "jumlah".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "jumlah".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level (available or minimum). Zero is allowed.
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a unit price. Must be strictly positive.
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "harga".to_string(),
        });
    }
    Ok(())
}

/// Validates a calendar month for the monthly sales query.
pub fn validate_month(month: u32) -> ValidationResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates every field of a new inventory record.
pub fn validate_new_inventory(input: &NewInventory) -> ValidationResult<()> {
    validate_sku(&input.sku)?;
    validate_batch_number(&input.batch_number)?;
    validate_item_name(&input.name)?;
    if let Some(category) = &input.category {
        validate_category(category)?;
    }
    validate_stock_level("stok_tersedia", input.quantity_available)?;
    validate_stock_level("stok_minimum", input.quantity_minimum)?;
    validate_unit_price(input.unit_price)
}

/// Validates the present fields of an inventory update.
pub fn validate_inventory_update(update: &InventoryUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        validate_item_name(name)?;
    }
    if let Some(category) = &update.category {
        validate_category(category)?;
    }
    if let Some(minimum) = update.quantity_minimum {
        validate_stock_level("stok_minimum", minimum)?;
    }
    if let Some(price) = update.unit_price {
        validate_unit_price(price)?;
    }
    if let Some(available) = update.quantity_available {
        validate_stock_level("stok_tersedia", available)?;
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the line list of a create or update request.
///
/// An empty list is reported by the caller as `CoreError::EmptyTransaction`;
/// here it only fails the size bound and per-line rules.
pub fn validate_line_requests(lines: &[LineRequest]) -> ValidationResult<()> {
    if lines.len() > MAX_TRANSACTION_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_TRANSACTION_LINES as i64,
        });
    }

    for line in lines {
        validate_sku(&line.sku)?;
        validate_batch_number(&line.batch_number)?;
        validate_line_quantity(line.quantity)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn new_inventory() -> NewInventory {
        NewInventory {
            sku: "TEST001".to_string(),
            batch_number: "B001".to_string(),
            name: "Test Item".to_string(),
            category: Some("Test Category".to_string()),
            quantity_available: 50,
            quantity_minimum: 10,
            unit_price: Money::from_cents(10_000),
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("TEST001").is_ok());
        assert!(validate_sku("PARA-500_mg").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(" TEST001").is_err());
        assert!(validate_sku("TEST001\n").is_err());
        assert!(validate_sku(&"A".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_batch_number() {
        assert!(validate_batch_number("B001").is_ok());
        assert!(validate_batch_number(&"B".repeat(50)).is_ok());
        assert!(validate_batch_number(&"B".repeat(51)).is_err());
        assert!(validate_batch_number("B/1").is_err());
        assert!(validate_batch_number("B001 ").is_err());
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-1).is_err());
        assert!(validate_line_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_unit_price_must_be_positive() {
        assert!(validate_unit_price(Money::from_cents(1)).is_ok());
        assert!(validate_unit_price(Money::zero()).is_err());
        assert!(validate_unit_price(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn test_validate_new_inventory() {
        assert!(validate_new_inventory(&new_inventory()).is_ok());

        let mut negative_stock = new_inventory();
        negative_stock.quantity_available = -1;
        assert!(validate_new_inventory(&negative_stock).is_err());

        let mut no_name = new_inventory();
        no_name.name = " ".to_string();
        assert!(matches!(
            validate_new_inventory(&no_name),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_inventory_update_checks_present_fields_only() {
        assert!(validate_inventory_update(&InventoryUpdate::default()).is_ok());

        let bad_price = InventoryUpdate {
            unit_price: Some(Money::zero()),
            ..Default::default()
        };
        assert!(validate_inventory_update(&bad_price).is_err());
    }

    #[test]
    fn test_validate_line_requests() {
        let lines = vec![
            LineRequest::new("TEST001", "B001", 5),
            LineRequest::new("TEST002", "B001", 1),
        ];
        assert!(validate_line_requests(&lines).is_ok());

        let zero = vec![LineRequest::new("TEST001", "B001", 0)];
        assert!(validate_line_requests(&zero).is_err());

        let too_many: Vec<_> = (0..=MAX_TRANSACTION_LINES)
            .map(|i| LineRequest::new(format!("SKU{i}"), "B001", 1))
            .collect();
        assert!(validate_line_requests(&too_many).is_err());
    }

    #[test]
    fn test_validate_search_query_trims() {
        assert_eq!(validate_search_query("  para ").unwrap(), "para");
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }
}
