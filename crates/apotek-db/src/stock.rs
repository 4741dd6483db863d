//! # Stock Mutator
//!
//! "Lock → validate → mutate" for one inventory key, inside a unit of work
//! the caller owns.
//!
//! ```text
//!   mutate_stock(conn, TEST001/B001, -5)
//!        │
//!        ├─ 1. lock_for_update ─────────► ProductNotFound
//!        │
//!        ├─ 2. delta < 0 and
//!        │     available < |delta| ─────► InsufficientStock { available, requested }
//!        │
//!        └─ 3. apply_delta ─────────────► StockMovement { before, after }
//! ```
//!
//! Nothing is committed here. A failure leaves the caller's transaction to
//! roll back whatever it already did.

use apotek_core::{CoreError, InventoryKey, InventoryRecord};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::inventory::InventoryRepository;

/// The effect of one stock mutation.
#[derive(Debug, Clone, Serialize)]
pub struct StockMovement {
    /// Record as read under the lock, before the delta.
    pub before: InventoryRecord,
    /// Signed delta that was applied.
    pub delta: i64,
    /// `quantity_available` after the delta.
    pub quantity_after: i64,
}

impl StockMovement {
    pub fn key(&self) -> InventoryKey {
        self.before.key()
    }
}

/// Locks `key`, checks the delta against available stock, applies it.
///
/// `delta` is negative for consumption and positive for restock.
pub async fn mutate_stock(
    conn: &mut SqliteConnection,
    key: &InventoryKey,
    delta: i64,
) -> DbResult<StockMovement> {
    let before = InventoryRepository::lock_for_update(conn, key).await?;

    if delta < 0 && before.quantity_available < delta.saturating_neg() {
        debug!(
            key = %key,
            available = before.quantity_available,
            requested = delta.saturating_neg(),
            "Insufficient stock"
        );
        return Err(CoreError::InsufficientStock {
            sku: key.sku.clone(),
            batch_number: key.batch_number.clone(),
            available: before.quantity_available,
            requested: delta.saturating_neg(),
        }
        .into());
    }

    let after = InventoryRepository::apply_delta(conn, &before, delta).await?;

    Ok(StockMovement {
        before,
        delta,
        quantity_after: after.quantity_available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::test_support::{memory_db, new_item};

    #[tokio::test]
    async fn test_consume_and_restock() {
        let db = memory_db().await;
        db.inventory()
            .create(new_item("TEST001", "B001", 50, 10_000))
            .await
            .unwrap();
        let key = InventoryKey::new("TEST001", "B001");

        let mut tx = db.pool().begin().await.unwrap();
        let out = mutate_stock(&mut tx, &key, -5).await.unwrap();
        assert_eq!(out.before.quantity_available, 50);
        assert_eq!(out.quantity_after, 45);

        let back = mutate_stock(&mut tx, &key, 2).await.unwrap();
        assert_eq!(back.quantity_after, 47);
        tx.commit().await.unwrap();

        let record = db.inventory().require(&key).await.unwrap();
        assert_eq!(record.quantity_available, 47);
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_quantities() {
        let db = memory_db().await;
        db.inventory()
            .create(new_item("TEST001", "B001", 50, 10_000))
            .await
            .unwrap();
        let key = InventoryKey::new("TEST001", "B001");

        let mut tx = db.pool().begin().await.unwrap();
        let err = mutate_stock(&mut tx, &key, -60).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock {
                available: 50,
                requested: 60,
                ..
            })
        ));
        drop(tx);

        let record = db.inventory().require(&key).await.unwrap();
        assert_eq!(record.quantity_available, 50);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let db = memory_db().await;
        let mut tx = db.pool().begin().await.unwrap();
        let err = mutate_stock(&mut tx, &InventoryKey::new("GHOST", "B0"), -1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn test_exact_depletion_allowed() {
        let db = memory_db().await;
        db.inventory()
            .create(new_item("TEST001", "B001", 3, 10_000))
            .await
            .unwrap();
        let mut tx = db.pool().begin().await.unwrap();
        let out = mutate_stock(&mut tx, &InventoryKey::new("TEST001", "B001"), -3)
            .await
            .unwrap();
        assert_eq!(out.quantity_after, 0);
    }
}
