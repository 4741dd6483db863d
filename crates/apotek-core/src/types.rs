//! # Domain Types
//!
//! Core domain types for the pharmacy stock ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────┐              │
//! │  │  InventoryRecord     │◄───────│  TransactionLine     │              │
//! │  │  ──────────────────  │ refs   │  ──────────────────  │              │
//! │  │  (sku, batch_number) │ (never │  (transaction_id,    │              │
//! │  │  quantity_available  │  owns) │   sequence)          │              │
//! │  │  quantity_minimum    │        │  unit_price_snapshot │              │
//! │  │  unit_price          │        │  subtotal            │              │
//! │  └──────────────────────┘        └──────────┬───────────┘              │
//! │                                             │ owned by                  │
//! │                                  ┌──────────▼───────────┐              │
//! │                                  │  TransactionHeader   │              │
//! │                                  │  ──────────────────  │              │
//! │                                  │  id (sequential)     │              │
//! │                                  │  kind, total_amount  │              │
//! │                                  └──────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A line freezes the item name and unit price at the moment it was
//! written. Later price edits on the inventory record never change
//! historical subtotals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Inventory Key
// =============================================================================

/// Composite identity of an inventory record. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryKey {
    pub sku: String,
    pub batch_number: String,
}

impl InventoryKey {
    pub fn new(sku: impl Into<String>, batch_number: impl Into<String>) -> Self {
        InventoryKey {
            sku: sku.into(),
            batch_number: batch_number.into(),
        }
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sku, self.batch_number)
    }
}

// =============================================================================
// Inventory Record
// =============================================================================

/// Stock for one batch of one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryRecord {
    pub sku: String,
    pub batch_number: String,

    /// Display name.
    pub name: String,

    pub category: Option<String>,

    /// Never negative.
    pub quantity_available: i64,

    /// Reorder threshold used by the low-stock listing.
    pub quantity_minimum: i64,

    /// Authoritative price for new transaction lines.
    pub unit_price_cents: i64,

    /// Bumped on every mutation.
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Returns the composite key.
    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(&self.sku, &self.batch_number)
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Whether this record belongs in the low-stock listing.
    pub fn is_low_stock(&self, comparison: LowStockComparison) -> bool {
        comparison.is_low(self.quantity_available, self.quantity_minimum)
    }
}

/// Input for creating an inventory record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventory {
    pub sku: String,
    pub batch_number: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity_available: i64,
    pub quantity_minimum: i64,
    pub unit_price: Money,
}

impl NewInventory {
    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(&self.sku, &self.batch_number)
    }
}

/// The mutable fields of an inventory record.
///
/// `None` leaves a field untouched. The key fields are deliberately absent:
/// `(sku, batch_number)` never changes after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity_minimum: Option<i64>,
    pub unit_price: Option<Money>,
    pub quantity_available: Option<i64>,
}

impl InventoryUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.quantity_minimum.is_none()
            && self.unit_price.is_none()
            && self.quantity_available.is_none()
    }

    /// True when a field shared by every batch of a SKU is present.
    pub fn touches_sku_fields(&self) -> bool {
        self.name.is_some()
            || self.category.is_some()
            || self.quantity_minimum.is_some()
            || self.unit_price.is_some()
    }
}

/// Filters for the inventory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring of name or SKU.
    pub search: Option<String>,
}

// =============================================================================
// Policies
// =============================================================================

/// How the low-stock listing compares stock to the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowStockComparison {
    /// `quantity_available <= quantity_minimum`
    #[default]
    Inclusive,
    /// `quantity_available < quantity_minimum`
    Strict,
}

impl LowStockComparison {
    pub fn is_low(self, available: i64, minimum: i64) -> bool {
        match self {
            LowStockComparison::Inclusive => available <= minimum,
            LowStockComparison::Strict => available < minimum,
        }
    }

    /// SQL comparison operator for this mode.
    pub fn sql_operator(self) -> &'static str {
        match self {
            LowStockComparison::Inclusive => "<=",
            LowStockComparison::Strict => "<",
        }
    }
}

impl FromStr for LowStockComparison {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" | "<=" => Ok(LowStockComparison::Inclusive),
            "strict" | "<" => Ok(LowStockComparison::Strict),
            _ => Err(ValidationError::NotAllowed {
                field: "low_stock_comparison".to_string(),
                allowed: vec!["inclusive".to_string(), "strict".to_string()],
            }),
        }
    }
}

/// Whether name/category/minimum/price are shared by every batch of a SKU.
///
/// ```text
/// Independent:          each batch owns its own descriptive fields
/// SharedAcrossBatches:  new batch inherits from an existing batch,
///                       edits propagate to all batches of the SKU
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkuFieldPolicy {
    #[default]
    Independent,
    SharedAcrossBatches,
}

impl FromStr for SkuFieldPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(SkuFieldPolicy::Independent),
            "shared" | "shared_across_batches" => Ok(SkuFieldPolicy::SharedAcrossBatches),
            _ => Err(ValidationError::NotAllowed {
                field: "sku_field_policy".to_string(),
                allowed: vec!["independent".to_string(), "shared".to_string()],
            }),
        }
    }
}

// =============================================================================
// Transaction Kind
// =============================================================================

/// Semantic type of a transaction.
///
/// Wire names follow the pharmacy's vocabulary: `pengurangan` (stock goes
/// out) and `penambahan` (stock comes in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Consumption. Counted by the monthly sales total.
    #[default]
    Sale,
    /// Stock received.
    Restock,
}

impl TransactionKind {
    /// Sign applied to a line quantity when the transaction takes effect.
    #[inline]
    pub const fn stock_sign(self) -> i64 {
        match self {
            TransactionKind::Sale => -1,
            TransactionKind::Restock => 1,
        }
    }

    /// Name used on the wire.
    pub const fn wire_name(self) -> &'static str {
        match self {
            TransactionKind::Sale => "pengurangan",
            TransactionKind::Restock => "penambahan",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pengurangan" | "sale" => Ok(TransactionKind::Sale),
            "penambahan" | "restock" => Ok(TransactionKind::Restock),
            _ => Err(ValidationError::NotAllowed {
                field: "jenis_transaksi".to_string(),
                allowed: vec!["pengurangan".to_string(), "penambahan".to_string()],
            }),
        }
    }
}

// =============================================================================
// Transaction Header / Line
// =============================================================================

/// Ledger header. Exclusively owns its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionHeader {
    /// Sequential id assigned by the store.
    pub id: i64,
    pub kind: TransactionKind,
    /// Σ line subtotals.
    pub total_amount_cents: i64,
    /// Opaque actor from the request context, audit only.
    pub recorded_by: Option<String>,
    /// Immutable.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TransactionHeader {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// One line item. Price and name are frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionLine {
    pub transaction_id: i64,
    /// 1-based position within the transaction.
    pub sequence: i64,
    pub sku: String,
    pub batch_number: String,
    pub item_name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl TransactionLine {
    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(&self.sku, &self.batch_number)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A header together with its lines, ordered by sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub header: TransactionHeader,
    pub lines: Vec<TransactionLine>,
}

/// One requested line: which batch, how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub sku: String,
    pub batch_number: String,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(sku: impl Into<String>, batch_number: impl Into<String>, quantity: i64) -> Self {
        LineRequest {
            sku: sku.into(),
            batch_number: batch_number.into(),
            quantity,
        }
    }

    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(&self.sku, &self.batch_number)
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// The already-authenticated caller, passed explicitly into every ledger
/// operation.
///
/// The engine never authorizes on it; it only records the actor on the
/// header and in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: String,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>) -> Self {
        RequestContext {
            actor: actor.into(),
        }
    }

    /// Context for seeders, maintenance jobs and tests.
    pub fn system() -> Self {
        RequestContext::new("system")
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }
}

// =============================================================================
// User
// =============================================================================

/// A login account for the API. Only the auth boundary reads this.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(available: i64, minimum: i64) -> InventoryRecord {
        let now = Utc::now();
        InventoryRecord {
            sku: "TEST002".to_string(),
            batch_number: "B001".to_string(),
            name: "Low Stock Item".to_string(),
            category: Some("Test Category".to_string()),
            quantity_available: available,
            quantity_minimum: minimum,
            unit_price_cents: 1_500_000,
            last_updated: now,
            created_at: now,
        }
    }

    #[test]
    fn test_low_stock_inclusive_vs_strict() {
        let at_minimum = record(10, 10);
        assert!(at_minimum.is_low_stock(LowStockComparison::Inclusive));
        assert!(!at_minimum.is_low_stock(LowStockComparison::Strict));

        let below = record(5, 10);
        assert!(below.is_low_stock(LowStockComparison::Inclusive));
        assert!(below.is_low_stock(LowStockComparison::Strict));

        let above = record(11, 10);
        assert!(!above.is_low_stock(LowStockComparison::Inclusive));
    }

    #[test]
    fn test_low_stock_default_is_inclusive() {
        assert_eq!(LowStockComparison::default(), LowStockComparison::Inclusive);
        assert_eq!(LowStockComparison::Inclusive.sql_operator(), "<=");
        assert_eq!(LowStockComparison::Strict.sql_operator(), "<");
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!(
            "strict".parse::<LowStockComparison>().unwrap(),
            LowStockComparison::Strict
        );
        assert!("sometimes".parse::<LowStockComparison>().is_err());
        assert_eq!(
            "shared".parse::<SkuFieldPolicy>().unwrap(),
            SkuFieldPolicy::SharedAcrossBatches
        );
        assert_eq!(SkuFieldPolicy::default(), SkuFieldPolicy::Independent);
    }

    #[test]
    fn test_transaction_kind_wire_names() {
        assert_eq!(
            "pengurangan".parse::<TransactionKind>().unwrap(),
            TransactionKind::Sale
        );
        assert_eq!(
            "PENAMBAHAN".parse::<TransactionKind>().unwrap(),
            TransactionKind::Restock
        );
        assert!("transfer".parse::<TransactionKind>().is_err());
        assert_eq!(TransactionKind::Sale.wire_name(), "pengurangan");
        assert_eq!(TransactionKind::Sale.stock_sign(), -1);
        assert_eq!(TransactionKind::Restock.stock_sign(), 1);
    }

    #[test]
    fn test_inventory_update_field_classes() {
        let empty = InventoryUpdate::default();
        assert!(empty.is_empty());
        assert!(!empty.touches_sku_fields());

        let stock_only = InventoryUpdate {
            quantity_available: Some(60),
            ..Default::default()
        };
        assert!(!stock_only.is_empty());
        assert!(!stock_only.touches_sku_fields());

        let price = InventoryUpdate {
            unit_price: Some(Money::from_cents(1_200_000)),
            ..Default::default()
        };
        assert!(price.touches_sku_fields());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(InventoryKey::new("TEST001", "B001").to_string(), "TEST001/B001");
    }
}
