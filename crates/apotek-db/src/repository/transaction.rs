//! # Transaction Repository
//!
//! Ledger rows: transaction headers and the lines they own.
//!
//! Writes happen only inside a [`LedgerWriter`](crate::ledger::LedgerWriter)
//! unit of work, so every write here takes a caller-supplied connection.
//! Reads go straight to the pool.

use apotek_core::ledger::PricedLine;
use apotek_core::{CoreError, LedgerEntry, Money, TransactionHeader, TransactionKind, TransactionLine};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const HEADER_COLUMNS: &str = "id, kind, total_amount_cents, recorded_by, created_at, updated_at";

const LINE_COLUMNS: &str = "transaction_id, sequence, sku, batch_number, item_name_snapshot, \
                            quantity, unit_price_cents, subtotal_cents";

/// Repository for transaction headers and lines.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Locks a header for the rest of the caller's unit of work.
    ///
    /// Same no-op write trick as
    /// [`InventoryRepository::lock_for_update`](super::inventory::InventoryRepository::lock_for_update).
    pub async fn lock_header(conn: &mut SqliteConnection, id: i64) -> DbResult<TransactionHeader> {
        debug!(transaction_id = id, "Locking transaction header");

        let sql = format!(
            "UPDATE transaction_headers SET updated_at = updated_at \
             WHERE id = ?1 RETURNING {HEADER_COLUMNS}"
        );

        sqlx::query_as::<_, TransactionHeader>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id).into())
    }

    /// Inserts a header and returns it with its assigned id.
    pub async fn insert_header(
        conn: &mut SqliteConnection,
        kind: TransactionKind,
        total: Money,
        recorded_by: &str,
        now: DateTime<Utc>,
    ) -> DbResult<TransactionHeader> {
        let sql = format!(
            "INSERT INTO transaction_headers (kind, total_amount_cents, recorded_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING {HEADER_COLUMNS}"
        );

        let header = sqlx::query_as::<_, TransactionHeader>(&sql)
            .bind(kind)
            .bind(total.cents())
            .bind(recorded_by)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;

        debug!(transaction_id = header.id, total = %total, "Inserted transaction header");
        Ok(header)
    }

    /// Sets a new total on an existing header.
    pub async fn update_header_total(
        conn: &mut SqliteConnection,
        id: i64,
        total: Money,
        now: DateTime<Utc>,
    ) -> DbResult<TransactionHeader> {
        let sql = format!(
            "UPDATE transaction_headers SET total_amount_cents = ?2, updated_at = ?3 \
             WHERE id = ?1 RETURNING {HEADER_COLUMNS}"
        );

        sqlx::query_as::<_, TransactionHeader>(&sql)
            .bind(id)
            .bind(total.cents())
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id).into())
    }

    /// Inserts one line at `sequence` (1-based).
    pub async fn insert_line(
        conn: &mut SqliteConnection,
        transaction_id: i64,
        sequence: i64,
        line: &PricedLine,
    ) -> DbResult<TransactionLine> {
        let sql = format!(
            "INSERT INTO transaction_lines ({LINE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING {LINE_COLUMNS}"
        );

        let line = sqlx::query_as::<_, TransactionLine>(&sql)
            .bind(transaction_id)
            .bind(sequence)
            .bind(&line.sku)
            .bind(&line.batch_number)
            .bind(&line.item_name_snapshot)
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.subtotal.cents())
            .fetch_one(&mut *conn)
            .await?;

        Ok(line)
    }

    /// Lines of a header inside the caller's unit of work, in sequence order.
    pub async fn lines_for(
        conn: &mut SqliteConnection,
        transaction_id: i64,
    ) -> DbResult<Vec<TransactionLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM transaction_lines \
             WHERE transaction_id = ?1 ORDER BY sequence"
        );

        let lines = sqlx::query_as::<_, TransactionLine>(&sql)
            .bind(transaction_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(lines)
    }

    /// Deletes every line of a header. Returns how many went.
    pub async fn delete_lines(conn: &mut SqliteConnection, transaction_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM transaction_lines WHERE transaction_id = ?1")
            .bind(transaction_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes a header. Its lines must already be gone.
    pub async fn delete_header(conn: &mut SqliteConnection, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM transaction_headers WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TransactionNotFound(id).into());
        }

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a header by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<TransactionHeader>> {
        let sql = format!("SELECT {HEADER_COLUMNS} FROM transaction_headers WHERE id = ?1");

        let header = sqlx::query_as::<_, TransactionHeader>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(header)
    }

    /// Gets a header with its lines.
    ///
    /// Reads both in one read transaction so the pair is consistent.
    pub async fn get_entry(&self, id: i64) -> DbResult<Option<LedgerEntry>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {HEADER_COLUMNS} FROM transaction_headers WHERE id = ?1");
        let header = sqlx::query_as::<_, TransactionHeader>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let entry = match header {
            Some(header) => {
                let lines = Self::lines_for(&mut tx, id).await?;
                Some(LedgerEntry { header, lines })
            }
            None => None,
        };

        tx.commit().await?;
        Ok(entry)
    }

    /// Lists headers, newest first.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<TransactionHeader>> {
        let sql = format!(
            "SELECT {HEADER_COLUMNS} FROM transaction_headers \
             ORDER BY id DESC LIMIT ?1 OFFSET ?2"
        );

        let headers = sqlx::query_as::<_, TransactionHeader>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(headers)
    }

    /// Lines of a header, in sequence order.
    pub async fn lines(&self, transaction_id: i64) -> DbResult<Vec<TransactionLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::lines_for(&mut conn, transaction_id).await
    }

    /// Counts headers (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transaction_headers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, new_item};
    use crate::error::DbError;
    use apotek_core::{LineRequest, RequestContext};

    #[tokio::test]
    async fn test_entry_lines_in_request_order() {
        let db = memory_db().await;
        db.inventory().create(new_item("B-SKU", "B1", 10, 500)).await.unwrap();
        db.inventory().create(new_item("A-SKU", "B1", 10, 700)).await.unwrap();

        let receipt = db
            .ledger()
            .create(
                &RequestContext::system(),
                TransactionKind::Sale,
                &[LineRequest::new("B-SKU", "B1", 1), LineRequest::new("A-SKU", "B1", 2)],
            )
            .await
            .unwrap();

        let entry = db
            .transactions()
            .get_entry(receipt.header.id)
            .await
            .unwrap()
            .unwrap();
        let order: Vec<_> = entry.lines.iter().map(|l| (l.sequence, l.sku.as_str())).collect();
        assert_eq!(order, vec![(1, "B-SKU"), (2, "A-SKU")]);
        assert_eq!(entry.header.total_amount_cents, 1_900);
        assert_eq!(entry.header.recorded_by.as_deref(), Some("system"));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = memory_db().await;
        db.inventory().create(new_item("TEST001", "B001", 50, 100)).await.unwrap();
        let ctx = RequestContext::system();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let receipt = db
                .ledger()
                .create(&ctx, TransactionKind::Sale, &[LineRequest::new("TEST001", "B001", 1)])
                .await
                .unwrap();
            ids.push(receipt.header.id);
        }

        let listed: Vec<i64> = db
            .transactions()
            .list(2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[1]]);
        assert_eq!(db.transactions().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lock_missing_header() {
        let db = memory_db().await;
        let mut tx = db.pool().begin().await.unwrap();
        let err = TransactionRepository::lock_header(&mut tx, 42).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::TransactionNotFound(42))));
        drop(tx);
        assert!(db.transactions().get(42).await.unwrap().is_none());
    }
}
