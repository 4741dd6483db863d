//! # Error Types
//!
//! Domain-specific error types for apotek-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  apotek-core errors (this file)                                        │
//! │  ├── CoreError        - Ledger and inventory rule violations           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  apotek-db errors                                                      │
//! │  └── DbError          - Store failures, Busy, wraps CoreError          │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - Status code + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised inside a unit of work.
///
/// Every variant aborts the unit of work it is raised in; the caller never
/// observes a partial stock mutation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No inventory record for the referenced key.
    #[error("Product not found: {sku}/{batch_number}")]
    ProductNotFound { sku: String, batch_number: String },

    /// No transaction header with this id.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(i64),

    /// Applying the delta would take stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Create transaction (jumlah: 60)
    ///      │
    ///      ▼
    /// Lock TEST001/B001: available=50
    ///      │
    ///      ▼
    /// InsufficientStock { available: 50, requested: 60 }
    ///      │
    ///      ▼
    /// Unit of work rolled back, 400 with both quantities
    /// ```
    #[error(
        "Insufficient stock for {sku}/{batch_number}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        sku: String,
        batch_number: String,
        available: i64,
        requested: i64,
    },

    /// An inventory record with the same key already exists.
    #[error("Inventory {sku}/{batch_number} already exists")]
    DuplicateInventory { sku: String, batch_number: String },

    /// The inventory record is still referenced by ledger lines.
    #[error("Inventory {sku}/{batch_number} is referenced by {references} transaction line(s)")]
    InventoryReferenced {
        sku: String,
        batch_number: String,
        references: i64,
    },

    /// A transaction must carry at least one line.
    #[error("Transaction must contain at least one item")]
    EmptyTransaction,

    /// Header total drifted from the sum of its lines.
    #[error("Transaction total {expected_cents} does not match line subtotals {actual_cents}")]
    TotalMismatch {
        expected_cents: i64,
        actual_cents: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a ProductNotFound error for an inventory key.
    pub fn product_not_found(sku: impl Into<String>, batch_number: impl Into<String>) -> Self {
        CoreError::ProductNotFound {
            sku: sku.into(),
            batch_number: batch_number.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any lock is taken, so they never cost a unit of work.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. a price with three decimals).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_reports_quantities() {
        let err = CoreError::InsufficientStock {
            sku: "TEST001".to_string(),
            batch_number: "B001".to_string(),
            available: 50,
            requested: 60,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for TEST001/B001: available 50, requested 60"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::TooLong {
            field: "batch_number".to_string(),
            max: 50,
        };
        assert_eq!(err.to_string(), "batch_number must be at most 50 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_product_not_found_helper() {
        let err = CoreError::product_not_found("PARA500", "LOT-7");
        assert_eq!(err.to_string(), "Product not found: PARA500/LOT-7");
    }
}
