//! # Ledger Arithmetic
//!
//! Pure calculations behind the transaction ledger: pricing a line from an
//! inventory snapshot, summing a header total, checking the total invariant,
//! and turning line quantities into signed stock deltas.
//!
//! ## Reversal Then Reapply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale #1 (TEST001/B001, jumlah 5) updated to jumlah 3                   │
//! │                                                                         │
//! │  stock 45 ──► reversal  (+5) ──► 50 ──► application (-3) ──► 47         │
//! │               reversal_delta        application_delta                   │
//! │                                                                         │
//! │  Both phases run in one unit of work; either both land or neither.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{InventoryRecord, TransactionKind};

/// Largest allowed gap between a header total and the sum of its lines.
pub const TOTAL_TOLERANCE: Money = Money::from_cents(1);

/// A priced line, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub sku: String,
    pub batch_number: String,
    pub item_name_snapshot: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Prices one line from the inventory record as read under lock.
///
/// The record's current price becomes the line's immutable snapshot.
///
/// ## Example
/// ```rust
/// use apotek_core::ledger::price_line;
/// # use apotek_core::InventoryRecord;
/// # use chrono::Utc;
/// # let record = InventoryRecord {
/// #     sku: "TEST001".into(), batch_number: "B001".into(), name: "Test".into(),
/// #     category: None, quantity_available: 50, quantity_minimum: 10,
/// #     unit_price_cents: 10_000, last_updated: Utc::now(), created_at: Utc::now(),
/// # };
/// let line = price_line(&record, 5).unwrap();
/// assert_eq!(line.subtotal.cents(), 50_000);
/// ```
pub fn price_line(record: &InventoryRecord, quantity: i64) -> CoreResult<PricedLine> {
    let unit_price = record.unit_price();
    let subtotal = unit_price.checked_multiply_quantity(quantity).ok_or_else(|| {
        CoreError::Validation(crate::error::ValidationError::OutOfRange {
            field: "jumlah".to_string(),
            min: 1,
            max: crate::MAX_LINE_QUANTITY,
        })
    })?;

    Ok(PricedLine {
        sku: record.sku.clone(),
        batch_number: record.batch_number.clone(),
        item_name_snapshot: record.name.clone(),
        quantity,
        unit_price,
        subtotal,
    })
}

/// Sums line subtotals into a header total.
pub fn total_of<'a>(lines: impl IntoIterator<Item = &'a PricedLine>) -> Money {
    lines.into_iter().map(|line| line.subtotal).sum()
}

/// Checks that a header total matches its line subtotals within
/// [`TOTAL_TOLERANCE`].
pub fn verify_total(total: Money, subtotals: impl IntoIterator<Item = Money>) -> CoreResult<()> {
    let actual: Money = subtotals.into_iter().sum();
    if total.within(actual, TOTAL_TOLERANCE) {
        Ok(())
    } else {
        Err(CoreError::TotalMismatch {
            expected_cents: total.cents(),
            actual_cents: actual.cents(),
        })
    }
}

/// Signed stock delta when a line of `kind` takes effect.
#[inline]
pub const fn application_delta(kind: TransactionKind, quantity: i64) -> i64 {
    kind.stock_sign() * quantity
}

/// Signed stock delta that undoes [`application_delta`].
#[inline]
pub const fn reversal_delta(kind: TransactionKind, quantity: i64) -> i64 {
    -application_delta(kind, quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(price_cents: i64) -> InventoryRecord {
        InventoryRecord {
            sku: "TEST001".to_string(),
            batch_number: "B001".to_string(),
            name: "Test Item".to_string(),
            category: None,
            quantity_available: 50,
            quantity_minimum: 10,
            unit_price_cents: price_cents,
            last_updated: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_line_snapshots_record() {
        let line = price_line(&record(10_000), 5).unwrap();
        assert_eq!(line.unit_price, Money::from_cents(10_000));
        assert_eq!(line.subtotal, Money::from_cents(50_000));
        assert_eq!(line.item_name_snapshot, "Test Item");
    }

    #[test]
    fn test_price_line_overflow_is_rejected() {
        let err = price_line(&record(i64::MAX / 2), 3).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_total_and_verify() {
        let lines = vec![
            price_line(&record(10_000), 5).unwrap(),
            price_line(&record(1_250), 2).unwrap(),
        ];
        let total = total_of(&lines);
        assert_eq!(total.cents(), 52_500);
        assert!(verify_total(total, lines.iter().map(|l| l.subtotal)).is_ok());
        assert!(verify_total(total + Money::from_cents(1), lines.iter().map(|l| l.subtotal)).is_ok());

        let err = verify_total(total + Money::from_cents(2), lines.iter().map(|l| l.subtotal));
        assert!(matches!(err, Err(CoreError::TotalMismatch { .. })));
    }

    #[test]
    fn test_deltas_cancel_out() {
        for kind in [TransactionKind::Sale, TransactionKind::Restock] {
            assert_eq!(application_delta(kind, 7) + reversal_delta(kind, 7), 0);
        }
        assert_eq!(application_delta(TransactionKind::Sale, 5), -5);
        assert_eq!(reversal_delta(TransactionKind::Sale, 5), 5);
        assert_eq!(application_delta(TransactionKind::Restock, 5), 5);
    }
}
