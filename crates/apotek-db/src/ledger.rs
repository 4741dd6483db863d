//! # Ledger Writer
//!
//! Creates, updates and deletes transactions. Each call is one atomic unit
//! of work: every stock movement and every ledger row it writes commits
//! together or not at all.
//!
//! ## Update = Reversal Then Reapply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update(#7, [TEST001/B001 × 3])            one sqlx Transaction         │
//! │                                                                         │
//! │  lock_header(#7) ───────────────────────── TransactionNotFound          │
//! │       │                                                                 │
//! │       ▼  reversal: for each old line                                   │
//! │  mutate_stock(TEST001/B001, +5)             45 → 50                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  delete_lines(#7)                                                      │
//! │       │                                                                 │
//! │       ▼  reapply: for each new line, in request order                  │
//! │  mutate_stock(TEST001/B001, -3)             50 → 47                     │
//! │  price_line (price read now = snapshot)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  update_header_total(#7, 300) + insert_line(#7, 1, …)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT  ── any error before this point drops the transaction,         │
//! │             rolling back reversal AND reapplication                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Busy Retry
//! A unit of work that fails with [`DbError::Busy`](crate::error::DbError::Busy) is retried once from
//! the start. A second `Busy` is returned to the caller.

use apotek_core::ledger::{
    application_delta, price_line, reversal_delta, total_of, verify_total, PricedLine,
};
use apotek_core::validation::validate_line_requests;
use apotek_core::{
    CoreError, LineRequest, Money, RequestContext, TransactionHeader, TransactionKind,
    TransactionLine,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::retry_once_on_busy;
use crate::repository::transaction::TransactionRepository;
use crate::stock::mutate_stock;

// =============================================================================
// Receipts
// =============================================================================

/// One written line with the stock left after it was applied.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptLine {
    pub line: TransactionLine,
    pub remaining_stock: i64,
}

/// Result of a create or update.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub header: TransactionHeader,
    pub lines: Vec<ReceiptLine>,
}

impl LedgerReceipt {
    pub fn total(&self) -> Money {
        self.header.total_amount()
    }
}

/// One line undone by a delete.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnedLine {
    pub sku: String,
    pub batch_number: String,
    /// Quantity given back to (or, for a restock, taken from) inventory.
    pub quantity_returned: i64,
    pub stock_after: i64,
}

/// Result of a delete.
#[derive(Debug, Clone, Serialize)]
pub struct ReversalReceipt {
    pub transaction_id: i64,
    pub kind: TransactionKind,
    pub lines: Vec<ReturnedLine>,
}

// =============================================================================
// Ledger Writer
// =============================================================================

/// Writes transactions and their stock effects.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    pool: SqlitePool,
}

impl LedgerWriter {
    /// Creates a new LedgerWriter.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerWriter { pool }
    }

    /// Records a new transaction.
    ///
    /// Lines are locked and applied in request order. The first failing line
    /// aborts the whole transaction with that line's error.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        kind: TransactionKind,
        lines: &[LineRequest],
    ) -> DbResult<LedgerReceipt> {
        validate_request(lines)?;

        let receipt =
            retry_once_on_busy("create", move || self.create_once(ctx, kind, lines)).await?;

        info!(
            transaction_id = receipt.header.id,
            kind = ?kind,
            actor = ctx.actor(),
            lines = receipt.lines.len(),
            total = %receipt.total(),
            "Transaction recorded"
        );
        Ok(receipt)
    }

    /// Replaces the lines of a transaction: reversal, then reapply.
    ///
    /// The header keeps its id, kind and `created_at`.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        transaction_id: i64,
        lines: &[LineRequest],
    ) -> DbResult<LedgerReceipt> {
        validate_request(lines)?;

        let receipt =
            retry_once_on_busy("update", move || self.update_once(transaction_id, lines)).await?;

        info!(
            transaction_id,
            actor = ctx.actor(),
            lines = receipt.lines.len(),
            total = %receipt.total(),
            "Transaction updated"
        );
        Ok(receipt)
    }

    /// Deletes a transaction after giving back its stock.
    pub async fn delete(&self, ctx: &RequestContext, transaction_id: i64) -> DbResult<ReversalReceipt> {
        let receipt =
            retry_once_on_busy("delete", move || self.delete_once(transaction_id)).await?;

        info!(
            transaction_id,
            actor = ctx.actor(),
            lines = receipt.lines.len(),
            "Transaction deleted"
        );
        Ok(receipt)
    }

    // =========================================================================
    // Units of work
    // =========================================================================

    async fn create_once(
        &self,
        ctx: &RequestContext,
        kind: TransactionKind,
        lines: &[LineRequest],
    ) -> DbResult<LedgerReceipt> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let applied = apply_lines(&mut tx, kind, lines).await?;
        let total = total_of(applied.iter().map(|a| &a.priced));

        let header =
            TransactionRepository::insert_header(&mut tx, kind, total, ctx.actor(), now).await?;
        let written = write_lines(&mut tx, header.id, applied).await?;
        verify_total(header.total_amount(), written.iter().map(|r| r.line.subtotal()))?;

        tx.commit().await?;

        Ok(LedgerReceipt {
            header,
            lines: written,
        })
    }

    async fn update_once(&self, transaction_id: i64, lines: &[LineRequest]) -> DbResult<LedgerReceipt> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let header = TransactionRepository::lock_header(&mut tx, transaction_id).await?;
        reverse_lines(&mut tx, &header).await?;
        TransactionRepository::delete_lines(&mut tx, transaction_id).await?;

        let applied = apply_lines(&mut tx, header.kind, lines).await?;
        let total = total_of(applied.iter().map(|a| &a.priced));

        let header =
            TransactionRepository::update_header_total(&mut tx, transaction_id, total, now).await?;
        let written = write_lines(&mut tx, transaction_id, applied).await?;
        verify_total(header.total_amount(), written.iter().map(|r| r.line.subtotal()))?;

        tx.commit().await?;

        Ok(LedgerReceipt {
            header,
            lines: written,
        })
    }

    async fn delete_once(&self, transaction_id: i64) -> DbResult<ReversalReceipt> {
        let mut tx = self.pool.begin().await?;

        let header = TransactionRepository::lock_header(&mut tx, transaction_id).await?;
        let returned = reverse_lines(&mut tx, &header).await?;

        // Lines first, then the header.
        TransactionRepository::delete_lines(&mut tx, transaction_id).await?;
        TransactionRepository::delete_header(&mut tx, transaction_id).await?;

        tx.commit().await?;

        Ok(ReversalReceipt {
            transaction_id,
            kind: header.kind,
            lines: returned,
        })
    }
}

// =============================================================================
// Shared steps
// =============================================================================

fn validate_request(lines: &[LineRequest]) -> DbResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyTransaction.into());
    }
    validate_line_requests(lines)?;
    Ok(())
}

/// A priced line whose stock delta has been applied.
struct AppliedLine {
    priced: PricedLine,
    remaining_stock: i64,
}

/// Applies every requested line in order and prices it from the locked
/// record.
async fn apply_lines(
    conn: &mut SqliteConnection,
    kind: TransactionKind,
    lines: &[LineRequest],
) -> DbResult<Vec<AppliedLine>> {
    let mut applied = Vec::with_capacity(lines.len());

    for request in lines {
        let movement = mutate_stock(conn, &request.key(), application_delta(kind, request.quantity))
            .await?;
        let priced = price_line(&movement.before, request.quantity)?;

        debug!(
            key = %request.key(),
            quantity = request.quantity,
            subtotal = %priced.subtotal,
            remaining = movement.quantity_after,
            "Line applied"
        );
        applied.push(AppliedLine {
            priced,
            remaining_stock: movement.quantity_after,
        });
    }

    Ok(applied)
}

/// Writes priced lines under `transaction_id`, numbering them from 1.
async fn write_lines(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    applied: Vec<AppliedLine>,
) -> DbResult<Vec<ReceiptLine>> {
    let mut written = Vec::with_capacity(applied.len());

    for (index, applied) in applied.into_iter().enumerate() {
        let sequence = index as i64 + 1;
        let line =
            TransactionRepository::insert_line(conn, transaction_id, sequence, &applied.priced)
                .await?;
        written.push(ReceiptLine {
            line,
            remaining_stock: applied.remaining_stock,
        });
    }

    Ok(written)
}

/// Undoes the stock effect of every current line of `header`.
async fn reverse_lines(
    conn: &mut SqliteConnection,
    header: &TransactionHeader,
) -> DbResult<Vec<ReturnedLine>> {
    let lines = TransactionRepository::lines_for(conn, header.id).await?;
    let mut returned = Vec::with_capacity(lines.len());

    for line in lines {
        let movement =
            mutate_stock(conn, &line.key(), reversal_delta(header.kind, line.quantity)).await?;

        debug!(
            transaction_id = header.id,
            key = %line.key(),
            quantity = line.quantity,
            stock_after = movement.quantity_after,
            "Line reversed"
        );
        returned.push(ReturnedLine {
            sku: line.sku,
            batch_number: line.batch_number,
            quantity_returned: line.quantity,
            stock_after: movement.quantity_after,
        });
    }

    Ok(returned)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::inventory::InventoryRepository;
    use crate::test_support::{memory_db, new_item, scratch_db};
    use crate::Database;
    use apotek_core::InventoryKey;
    use std::time::Duration;

    async fn stock_of(db: &Database, sku: &str, batch: &str) -> i64 {
        db.inventory()
            .require(&InventoryKey::new(sku, batch))
            .await
            .unwrap()
            .quantity_available
    }

    async fn seeded() -> Database {
        let db = memory_db().await;
        db.inventory()
            .create(new_item("TEST001", "B001", 50, 10_000))
            .await
            .unwrap();
        db
    }

    fn sale(sku: &str, batch: &str, quantity: i64) -> Vec<LineRequest> {
        vec![LineRequest::new(sku, batch, quantity)]
    }

    #[tokio::test]
    async fn test_create_update_delete_round_trip() {
        let db = seeded().await;
        let ctx = RequestContext::new("apoteker");

        let created = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &sale("TEST001", "B001", 5))
            .await
            .unwrap();
        assert_eq!(created.total(), Money::from_cents(50_000));
        assert_eq!(created.lines.len(), 1);
        assert_eq!(created.lines[0].remaining_stock, 45);
        assert_eq!(created.header.recorded_by.as_deref(), Some("apoteker"));
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 45);

        let id = created.header.id;
        let updated = db
            .ledger()
            .update(&ctx, id, &sale("TEST001", "B001", 3))
            .await
            .unwrap();
        assert_eq!(updated.header.id, id);
        assert_eq!(updated.total(), Money::from_cents(30_000));
        assert_eq!(updated.header.created_at, created.header.created_at);
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 47);

        let reversed = db.ledger().delete(&ctx, id).await.unwrap();
        assert_eq!(reversed.lines.len(), 1);
        assert_eq!(reversed.lines[0].quantity_returned, 3);
        assert_eq!(reversed.lines[0].stock_after, 50);
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);

        assert!(db.transactions().get_entry(id).await.unwrap().is_none());
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_over_demand_leaves_stock_unchanged() {
        let db = seeded().await;
        let err = db
            .ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &sale("TEST001", "B001", 60))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock {
                available: 50,
                requested: 60,
                ..
            })
        ));
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);
        assert_eq!(db.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_later_line_rolls_back_earlier_lines() {
        let db = seeded().await;
        db.inventory()
            .create(new_item("TEST002", "B001", 2, 5_000))
            .await
            .unwrap();

        let lines = vec![
            LineRequest::new("TEST001", "B001", 10),
            LineRequest::new("TEST002", "B001", 3),
        ];
        let err = db
            .ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &lines)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));

        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);
        assert_eq!(stock_of(&db, "TEST002", "B001").await, 2);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = seeded().await;
        let lines = vec![
            LineRequest::new("TEST001", "B001", 1),
            LineRequest::new("GHOST", "B001", 1),
        ];
        let err = db
            .ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &lines)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::ProductNotFound { .. })));
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);
    }

    #[tokio::test]
    async fn test_empty_and_invalid_requests() {
        let db = seeded().await;
        let ctx = RequestContext::system();

        let err = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::EmptyTransaction)));

        let err = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &sale("TEST001", "B001", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let err = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &sale(" TEST001", "B001", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);
    }

    #[tokio::test]
    async fn test_update_to_same_lines_leaves_stock_unchanged() {
        let db = seeded().await;
        db.inventory()
            .create(new_item("TEST002", "B001", 20, 2_500))
            .await
            .unwrap();
        let ctx = RequestContext::system();
        let lines = vec![
            LineRequest::new("TEST001", "B001", 4),
            LineRequest::new("TEST002", "B001", 7),
        ];

        let created = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &lines)
            .await
            .unwrap();
        let before = (
            stock_of(&db, "TEST001", "B001").await,
            stock_of(&db, "TEST002", "B001").await,
        );

        let updated = db
            .ledger()
            .update(&ctx, created.header.id, &lines)
            .await
            .unwrap();
        let after = (
            stock_of(&db, "TEST001", "B001").await,
            stock_of(&db, "TEST002", "B001").await,
        );

        assert_eq!(before, (46, 13));
        assert_eq!(before, after);
        assert_eq!(updated.total(), created.total());
    }

    #[tokio::test]
    async fn test_failed_update_restores_everything() {
        let db = seeded().await;
        let ctx = RequestContext::system();
        let created = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &sale("TEST001", "B001", 5))
            .await
            .unwrap();

        // 45 left, reversal gives back 5, 51 is still too many.
        let err = db
            .ledger()
            .update(&ctx, created.header.id, &sale("TEST001", "B001", 51))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock {
                available: 50,
                requested: 51,
                ..
            })
        ));

        assert_eq!(stock_of(&db, "TEST001", "B001").await, 45);
        let entry = db
            .transactions()
            .get_entry(created.header.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.lines.len(), 1);
        assert_eq!(entry.lines[0].quantity, 5);
        assert_eq!(entry.header.total_amount_cents, 50_000);
    }

    #[tokio::test]
    async fn test_missing_transaction() {
        let db = seeded().await;
        let ctx = RequestContext::system();

        let err = db
            .ledger()
            .update(&ctx, 999, &sale("TEST001", "B001", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::TransactionNotFound(999))));

        let err = db.ledger().delete(&ctx, 999).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::TransactionNotFound(999))));
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_price_change() {
        let db = seeded().await;
        let ctx = RequestContext::system();
        let created = db
            .ledger()
            .create(&ctx, TransactionKind::Sale, &sale("TEST001", "B001", 2))
            .await
            .unwrap();

        db.inventory()
            .update_fields(
                &InventoryKey::new("TEST001", "B001"),
                &apotek_core::InventoryUpdate {
                    unit_price: Some(Money::from_cents(99_999)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let entry = db
            .transactions()
            .get_entry(created.header.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.lines[0].unit_price_cents, 10_000);
        assert_eq!(entry.lines[0].subtotal_cents, 20_000);
        assert_eq!(entry.lines[0].item_name_snapshot, "Item TEST001");
    }

    #[tokio::test]
    async fn test_restock_adds_and_reverses() {
        let db = seeded().await;
        let ctx = RequestContext::system();
        let created = db
            .ledger()
            .create(&ctx, TransactionKind::Restock, &sale("TEST001", "B001", 20))
            .await
            .unwrap();
        assert_eq!(created.header.kind, TransactionKind::Restock);
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 70);

        db.ledger().delete(&ctx, created.header.id).await.unwrap();
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 50);
    }

    #[tokio::test]
    async fn test_delete_inventory_referenced_by_line() {
        let db = seeded().await;
        db.ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &sale("TEST001", "B001", 1))
            .await
            .unwrap();

        let err = db
            .inventory()
            .delete(&InventoryKey::new("TEST001", "B001"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InventoryReferenced { references: 1, .. })
        ));
        assert_eq!(stock_of(&db, "TEST001", "B001").await, 49);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_over_demand_exactly_one_wins() {
        let scratch = scratch_db(Duration::from_secs(5)).await;
        scratch
            .db
            .inventory()
            .create(new_item("TEST001", "B001", 50, 10_000))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for actor in ["kasir-1", "kasir-2"] {
            let db = scratch.db.clone();
            handles.push(tokio::spawn(async move {
                db.ledger()
                    .create(
                        &RequestContext::new(actor),
                        TransactionKind::Sale,
                        &[LineRequest::new("TEST001", "B001", 30)],
                    )
                    .await
            }));
        }

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::Core(CoreError::InsufficientStock { available, .. })) => {
                    assert_eq!(available, 20);
                    insufficient += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((succeeded, insufficient), (1, 1));
        assert_eq!(stock_of(&scratch.db, "TEST001", "B001").await, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lock_held_past_busy_timeout_surfaces_busy() {
        let scratch = scratch_db(Duration::from_millis(50)).await;
        scratch
            .db
            .inventory()
            .create(new_item("TEST001", "B001", 50, 10_000))
            .await
            .unwrap();

        let mut blocker = scratch.db.pool().begin().await.unwrap();
        InventoryRepository::lock_for_update(&mut blocker, &InventoryKey::new("TEST001", "B001"))
            .await
            .unwrap();

        let err = scratch
            .db
            .ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &sale("TEST001", "B001", 1))
            .await
            .unwrap_err();
        assert!(err.is_busy(), "expected Busy, got {err:?}");

        blocker.rollback().await.unwrap();

        scratch
            .db
            .ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &sale("TEST001", "B001", 1))
            .await
            .unwrap();
        assert_eq!(stock_of(&scratch.db, "TEST001", "B001").await, 49);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_busy_retry_recovers_when_lock_is_released() {
        let scratch = scratch_db(Duration::from_millis(300)).await;
        scratch
            .db
            .inventory()
            .create(new_item("TEST001", "B001", 50, 10_000))
            .await
            .unwrap();

        // Held longer than one busy timeout, shorter than two.
        let mut blocker = scratch.db.pool().begin().await.unwrap();
        InventoryRepository::lock_for_update(&mut blocker, &InventoryKey::new("TEST001", "B001"))
            .await
            .unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            blocker.rollback().await.unwrap();
        });

        let receipt = scratch
            .db
            .ledger()
            .create(&RequestContext::system(), TransactionKind::Sale, &sale("TEST001", "B001", 1))
            .await
            .unwrap();
        release.await.unwrap();

        assert_eq!(receipt.total(), Money::from_cents(10_000));
        assert_eq!(stock_of(&scratch.db, "TEST001", "B001").await, 49);
    }
}
