//! # Inventory Repository
//!
//! The Inventory Store: one row per `(sku, batch_number)`.
//!
//! ## Row Locking on SQLite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock_for_update(TEST001/B001)                                          │
//! │                                                                         │
//! │  UPDATE inventory                                                      │
//! │     SET quantity_available = quantity_available   ← no-op write        │
//! │   WHERE sku = ?1 AND batch_number = ?2                                 │
//! │  RETURNING …                                       ← row as locked     │
//! │                                                                         │
//! │  The write takes the database write lock BEFORE the row is read, so    │
//! │  the returned quantity cannot change under us until COMMIT/ROLLBACK.   │
//! │  A competing unit of work blocks on its own first write until then.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write path in this module starts with a write statement for the
//! same reason: a deferred SQLite transaction that reads first and writes
//! later can fail with a stale snapshot instead of waiting.

use apotek_core::validation::{
    validate_batch_number, validate_inventory_update, validate_new_inventory,
    validate_search_query, validate_sku,
};
use apotek_core::{
    CoreError, InventoryFilter, InventoryKey, InventoryRecord, InventoryUpdate, NewInventory,
    SkuFieldPolicy,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{like_pattern, retry_once_on_busy};
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "sku, batch_number, name, category, quantity_available, \
                       quantity_minimum, unit_price_cents, last_updated, created_at";

/// Repository for inventory records.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    policy: SkuFieldPolicy,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool, policy: SkuFieldPolicy) -> Self {
        InventoryRepository { pool, policy }
    }

    // =========================================================================
    // Unit-of-work operations
    // =========================================================================

    /// Locks an inventory record for the rest of the caller's unit of work.
    ///
    /// ## Returns
    /// The record as seen under the lock, or `ProductNotFound`.
    pub async fn lock_for_update(
        conn: &mut SqliteConnection,
        key: &InventoryKey,
    ) -> DbResult<InventoryRecord> {
        debug!(key = %key, "Locking inventory record");

        let sql = format!(
            "UPDATE inventory SET quantity_available = quantity_available \
             WHERE sku = ?1 AND batch_number = ?2 RETURNING {COLUMNS}"
        );

        sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(&key.sku)
            .bind(&key.batch_number)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::product_not_found(&key.sku, &key.batch_number).into())
    }

    /// Applies a signed delta to a locked record.
    ///
    /// ## Errors
    /// `InsufficientStock` when `quantity_available + delta < 0`; nothing is
    /// written in that case.
    pub async fn apply_delta(
        conn: &mut SqliteConnection,
        record: &InventoryRecord,
        delta: i64,
    ) -> DbResult<InventoryRecord> {
        let new_quantity = record
            .quantity_available
            .checked_add(delta)
            .filter(|quantity| *quantity >= 0)
            .ok_or_else(|| CoreError::InsufficientStock {
                sku: record.sku.clone(),
                batch_number: record.batch_number.clone(),
                available: record.quantity_available,
                requested: delta.saturating_neg(),
            })?;

        debug!(
            key = %record.key(),
            from = record.quantity_available,
            to = new_quantity,
            "Applying stock delta"
        );

        let sql = format!(
            "UPDATE inventory SET quantity_available = ?3, last_updated = ?4 \
             WHERE sku = ?1 AND batch_number = ?2 RETURNING {COLUMNS}"
        );

        sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(&record.sku)
            .bind(&record.batch_number)
            .bind(new_quantity)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::product_not_found(&record.sku, &record.batch_number).into())
    }

    /// Counts transaction lines referencing a key.
    pub async fn count_references(conn: &mut SqliteConnection, key: &InventoryKey) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transaction_lines WHERE sku = ?1 AND batch_number = ?2",
        )
        .bind(&key.sku)
        .bind(&key.batch_number)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Pool-level operations
    // =========================================================================

    /// Creates an inventory record. Never overwrites an existing key.
    ///
    /// With [`SkuFieldPolicy::SharedAcrossBatches`], a new batch of a known
    /// SKU takes name, category, minimum and price from the oldest existing
    /// batch instead of the input.
    pub async fn create(&self, input: NewInventory) -> DbResult<InventoryRecord> {
        validate_new_inventory(&input)?;

        debug!(key = %input.key(), policy = ?self.policy, "Creating inventory record");

        let record = retry_once_on_busy("inventory create", || self.create_once(&input)).await?;

        info!(key = %record.key(), quantity = record.quantity_available, "Inventory created");
        Ok(record)
    }

    /// Updates the mutable fields of a record.
    ///
    /// An empty `category` clears it. With
    /// [`SkuFieldPolicy::SharedAcrossBatches`], name, category, minimum and
    /// price are copied to every other batch of the SKU in the same unit of
    /// work.
    pub async fn update_fields(
        &self,
        key: &InventoryKey,
        update: &InventoryUpdate,
    ) -> DbResult<InventoryRecord> {
        validate_inventory_update(update)?;

        let record =
            retry_once_on_busy("inventory update", || self.update_fields_once(key, update)).await?;

        info!(key = %key, "Inventory updated");
        Ok(record)
    }

    /// Deletes a record that no transaction line references.
    ///
    /// ## Errors
    /// - `ProductNotFound` if absent
    /// - `InventoryReferenced` if any line still points at it
    pub async fn delete(&self, key: &InventoryKey) -> DbResult<()> {
        retry_once_on_busy("inventory delete", || self.delete_once(key)).await?;

        info!(key = %key, "Inventory deleted");
        Ok(())
    }

    async fn create_once(&self, input: &NewInventory) -> DbResult<InventoryRecord> {
        let key = input.key();
        let category = input
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO inventory ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             ON CONFLICT (sku, batch_number) DO NOTHING RETURNING {COLUMNS}"
        );

        let inserted = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(&input.sku)
            .bind(&input.batch_number)
            .bind(input.name.trim())
            .bind(category)
            .bind(input.quantity_available)
            .bind(input.quantity_minimum)
            .bind(input.unit_price.cents())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::DuplicateInventory {
                sku: key.sku.clone(),
                batch_number: key.batch_number.clone(),
            })?;

        let record = match self.policy {
            SkuFieldPolicy::Independent => inserted,
            SkuFieldPolicy::SharedAcrossBatches => {
                let sibling = sqlx::query_as::<_, InventoryRecord>(&format!(
                    "SELECT {COLUMNS} FROM inventory \
                     WHERE sku = ?1 AND batch_number <> ?2 \
                     ORDER BY created_at, batch_number LIMIT 1"
                ))
                .bind(&inserted.sku)
                .bind(&inserted.batch_number)
                .fetch_optional(&mut *tx)
                .await?;

                match sibling {
                    Some(sibling) => {
                        debug!(key = %key, from = %sibling.key(), "New batch inherits SKU-level fields");
                        sqlx::query_as::<_, InventoryRecord>(&format!(
                            "UPDATE inventory SET name = ?3, category = ?4, \
                                 quantity_minimum = ?5, unit_price_cents = ?6 \
                             WHERE sku = ?1 AND batch_number = ?2 RETURNING {COLUMNS}"
                        ))
                        .bind(&inserted.sku)
                        .bind(&inserted.batch_number)
                        .bind(&sibling.name)
                        .bind(&sibling.category)
                        .bind(sibling.quantity_minimum)
                        .bind(sibling.unit_price_cents)
                        .fetch_one(&mut *tx)
                        .await?
                    }
                    None => inserted,
                }
            }
        };

        tx.commit().await?;
        Ok(record)
    }

    async fn update_fields_once(
        &self,
        key: &InventoryKey,
        update: &InventoryUpdate,
    ) -> DbResult<InventoryRecord> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_for_update(&mut tx, key).await?;
        if update.is_empty() {
            return Ok(current);
        }

        debug!(key = %key, "Updating inventory fields");

        let sql = format!(
            "UPDATE inventory SET \
                 name = COALESCE(?3, name), \
                 category = CASE WHEN ?4 IS NULL THEN category \
                                 WHEN ?4 = '' THEN NULL ELSE ?4 END, \
                 quantity_minimum = COALESCE(?5, quantity_minimum), \
                 unit_price_cents = COALESCE(?6, unit_price_cents), \
                 quantity_available = COALESCE(?7, quantity_available), \
                 last_updated = ?8 \
             WHERE sku = ?1 AND batch_number = ?2 RETURNING {COLUMNS}"
        );

        let record = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(&key.sku)
            .bind(&key.batch_number)
            .bind(update.name.as_deref().map(str::trim))
            .bind(update.category.as_deref().map(str::trim))
            .bind(update.quantity_minimum)
            .bind(update.unit_price.map(|p| p.cents()))
            .bind(update.quantity_available)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        if self.policy == SkuFieldPolicy::SharedAcrossBatches && update.touches_sku_fields() {
            let propagated = sqlx::query(
                "UPDATE inventory SET name = ?3, category = ?4, quantity_minimum = ?5, \
                     unit_price_cents = ?6, last_updated = ?7 \
                 WHERE sku = ?1 AND batch_number <> ?2",
            )
            .bind(&record.sku)
            .bind(&record.batch_number)
            .bind(&record.name)
            .bind(&record.category)
            .bind(record.quantity_minimum)
            .bind(record.unit_price_cents)
            .bind(record.last_updated)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            debug!(sku = %record.sku, batches = propagated, "Propagated SKU-level fields");
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn delete_once(&self, key: &InventoryKey) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::lock_for_update(&mut tx, key).await?;

        let references = Self::count_references(&mut tx, key).await?;
        if references > 0 {
            return Err(CoreError::InventoryReferenced {
                sku: key.sku.clone(),
                batch_number: key.batch_number.clone(),
                references,
            }
            .into());
        }

        sqlx::query("DELETE FROM inventory WHERE sku = ?1 AND batch_number = ?2")
            .bind(&key.sku)
            .bind(&key.batch_number)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets a record by key.
    pub async fn get(&self, key: &InventoryKey) -> DbResult<Option<InventoryRecord>> {
        validate_sku(&key.sku)?;
        validate_batch_number(&key.batch_number)?;

        let sql = format!("SELECT {COLUMNS} FROM inventory WHERE sku = ?1 AND batch_number = ?2");

        let record = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(&key.sku)
            .bind(&key.batch_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Gets a record by key, failing with `ProductNotFound` when absent.
    pub async fn require(&self, key: &InventoryKey) -> DbResult<InventoryRecord> {
        self.get(key).await?.ok_or_else(|| {
            DbError::from(CoreError::product_not_found(&key.sku, &key.batch_number))
        })
    }

    /// Lists records, ordered by SKU then batch.
    ///
    /// `category` matches exactly; `search` is a case-insensitive substring
    /// of the name or the SKU.
    pub async fn list(&self, filter: &InventoryFilter) -> DbResult<Vec<InventoryRecord>> {
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let search = match filter.search.as_deref() {
            Some(raw) => Some(validate_search_query(raw)?).filter(|q| !q.is_empty()),
            None => None,
        };
        let pattern = search.as_deref().map(like_pattern);

        debug!(category = ?category, search = ?search, "Listing inventory");

        let sql = format!(
            "SELECT {COLUMNS} FROM inventory \
             WHERE (?1 IS NULL OR category = ?1) \
               AND (?2 IS NULL OR lower(name) LIKE ?2 ESCAPE '\\' \
                               OR lower(sku) LIKE ?2 ESCAPE '\\') \
             ORDER BY sku, batch_number"
        );

        let records = sqlx::query_as::<_, InventoryRecord>(&sql)
            .bind(category)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Counts inventory records (for diagnostics and the seeder).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
