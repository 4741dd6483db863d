//! # Query Service
//!
//! Read-only projections over inventory and the ledger. Nothing here takes
//! a write lock; in WAL mode these reads never wait for a writer.

use apotek_core::validation::validate_month;
use apotek_core::{InventoryRecord, LowStockComparison, Money, TransactionKind};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Sum of sales for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlySales {
    pub year: i32,
    pub month: u32,
    pub total: Money,
}

/// Read-only reports.
#[derive(Debug, Clone)]
pub struct QueryService {
    pool: SqlitePool,
    comparison: LowStockComparison,
}

impl QueryService {
    /// Creates a new QueryService.
    pub fn new(pool: SqlitePool, comparison: LowStockComparison) -> Self {
        QueryService { pool, comparison }
    }

    /// The comparison this service applies to low-stock listings.
    pub fn low_stock_comparison(&self) -> LowStockComparison {
        self.comparison
    }

    /// Records at or below (or strictly below) their minimum, lowest stock
    /// first.
    pub async fn low_stock(&self) -> DbResult<Vec<InventoryRecord>> {
        let sql = format!(
            "SELECT sku, batch_number, name, category, quantity_available, quantity_minimum, \
                    unit_price_cents, last_updated, created_at \
             FROM inventory \
             WHERE quantity_available {} quantity_minimum \
             ORDER BY quantity_available, sku, batch_number",
            self.comparison.sql_operator()
        );

        let records = sqlx::query_as::<_, InventoryRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = records.len(), comparison = ?self.comparison, "Low-stock listing");
        Ok(records)
    }

    /// Total of sale transactions created in `year`/`month` (UTC).
    ///
    /// Zero when nothing matches. Restocks are not counted.
    pub async fn monthly_sales(&self, year: i32, month: u32) -> DbResult<MonthlySales> {
        validate_month(month)?;
        let (start, end) = month_bounds(year, month)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount_cents), 0) FROM transaction_headers \
             WHERE kind = ?1 AND created_at >= ?2 AND created_at < ?3",
        )
        .bind(TransactionKind::Sale)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        debug!(year, month, total, "Monthly sales");

        Ok(MonthlySales {
            year,
            month,
            total: Money::from_cents(total),
        })
    }
}

/// `[first instant of month, first instant of next month)` in UTC.
fn month_bounds(year: i32, month: u32) -> DbResult<(DateTime<Utc>, DateTime<Utc>)> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single();

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(DbError::from(apotek_core::ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 1,
            max: 9999,
        })),
    }
}
