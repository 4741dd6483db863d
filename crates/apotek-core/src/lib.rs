//! # apotek-core: Pure Business Logic for the Apotek Stock Ledger
//!
//! Domain types and rules for pharmacy stock keyed by `(sku, batch_number)`
//! and for the transaction ledger that consumes or restocks it.
//! Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotek Stock Ledger                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                REST API (apps/api, axum)                        │   │
//! │  │   auth middleware ──► handlers ──► RequestContext               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 apotek-db (storage + engine)                    │   │
//! │  │   LedgerWriter ──► StockMutator ──► InventoryRepository         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ uses                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ apotek-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ validation│   │   │
//! │  │   │ Inventory │  │   Money   │  │ pricing   │  │   rules   │   │   │
//! │  │   │ Header    │  │  (cents)  │  │ totals    │  │           │   │   │
//! │  │   │ Line      │  │           │  │ deltas    │  │           │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Inventory records, transaction headers and lines, policies
//! - [`money`] - Money type with integer arithmetic (no floating point)
//! - [`ledger`] - Line pricing, total invariants, stock deltas
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use apotek_core::money::Money;
//!
//! let price = Money::from_decimal_str("100").unwrap();
//! let subtotal = price.multiply_quantity(5);
//! assert_eq!(subtotal.cents(), 50_000);
//! ```

pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of line items in one transaction.
pub const MAX_TRANSACTION_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// Guards against typing mistakes (100000 instead of 10) and keeps
/// `unit_price × quantity` far away from `i64` overflow.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Default reorder threshold for a new inventory record.
pub const DEFAULT_QUANTITY_MINIMUM: i64 = 10;
