//! # apotek-db: Storage Layer and Stock-Ledger Engine
//!
//! SQLite access for the apotek stock ledger, plus the engine that keeps
//! stock consistent while transactions are created, edited and cancelled.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Apotek Data Flow                                 │
//! │                                                                         │
//! │  POST /transactions (apps/api)                                         │
//! │       │  RequestContext + Vec<LineRequest>                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     apotek-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │ LedgerWriter  │──►│ mutate_stock  │──►│ Inventory     │    │   │
//! │  │   │ (ledger.rs)   │   │ (stock.rs)    │   │ Repository    │    │   │
//! │  │   │ one sqlx tx   │   │ lock → check  │   │ lock / delta  │    │   │
//! │  │   │ retry on Busy │   │ → apply       │   │               │    │   │
//! │  │   └──────┬────────┘   └───────────────┘   └───────────────┘    │   │
//! │  │          │                                                      │   │
//! │  │          ▼                                                      │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │ Transaction   │   │ QueryService  │   │  Database     │    │   │
//! │  │   │ Repository    │   │ low stock,    │   │  (pool.rs)    │    │   │
//! │  │   │ headers/lines │   │ monthly sales │   │  SqlitePool   │    │   │
//! │  │   └───────────────┘   └───────────────┘   └───────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys, busy timeout)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Inventory, ledger row and user repositories
//! - [`stock`] - Stock Mutator
//! - [`ledger`] - Ledger Writer
//! - [`query`] - Query Service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apotek_core::{LineRequest, RequestContext, TransactionKind};
//! use apotek_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("apotek.db")).await?;
//! let receipt = db
//!     .ledger()
//!     .create(&RequestContext::new("admin"), TransactionKind::Sale,
//!             &[LineRequest::new("TEST001", "B001", 5)])
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;
pub mod stock;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::{LedgerReceipt, LedgerWriter, ReceiptLine, ReturnedLine, ReversalReceipt};
pub use pool::{Database, DbConfig};
pub use query::{MonthlySales, QueryService};
pub use stock::{mutate_stock, StockMovement};

// Repository re-exports for convenience
pub use repository::inventory::InventoryRepository;
pub use repository::transaction::TransactionRepository;
pub use repository::user::UserRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::time::Duration;

    use apotek_core::{Money, NewInventory};

    use crate::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// A file-backed database with several connections, removed on drop.
    pub struct ScratchDb {
        pub db: Database,
        path: PathBuf,
    }

    impl Drop for ScratchDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = self.path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }

    pub async fn scratch_db(busy_timeout: Duration) -> ScratchDb {
        let path = std::env::temp_dir().join(format!("apotek-test-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(4)
                .busy_timeout(busy_timeout),
        )
        .await
        .unwrap();
        ScratchDb { db, path }
    }

    pub fn new_item(sku: &str, batch: &str, quantity: i64, price_cents: i64) -> NewInventory {
        NewInventory {
            sku: sku.to_string(),
            batch_number: batch.to_string(),
            name: format!("Item {sku}"),
            category: Some("Obat Bebas".to_string()),
            quantity_available: quantity,
            quantity_minimum: apotek_core::DEFAULT_QUANTITY_MINIMUM,
            unit_price: Money::from_cents(price_cents),
        }
    }
}
