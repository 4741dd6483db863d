//! # Repository Module
//!
//! SQL access for the stock ledger, one repository per table group.
//!
//! ## Two Kinds of Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-level (&self)                 Unit-of-work level (conn)          │
//! │  ─────────────────────              ──────────────────────────         │
//! │  open their own transaction         run on the caller's connection     │
//! │  or read straight from the pool     inside the caller's transaction    │
//! │                                                                         │
//! │  InventoryRepository::create        InventoryRepository::lock_for_update│
//! │  InventoryRepository::update_fields InventoryRepository::apply_delta   │
//! │  InventoryRepository::delete        TransactionRepository::lock_header │
//! │  TransactionRepository::get_entry   TransactionRepository::insert_line │
//! │                                                                         │
//! │  The unit-of-work functions take `&mut SqliteConnection`, so callers   │
//! │  pass `&mut *tx` and decide when to commit.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - Inventory Store
//! - [`TransactionRepository`](transaction::TransactionRepository) - ledger rows
//! - [`UserRepository`](user::UserRepository) - API accounts

pub mod inventory;
pub mod transaction;
pub mod user;

use std::future::Future;

use tracing::warn;

use crate::error::DbResult;

/// Runs `attempt`, retrying once if it fails with `Busy`.
///
/// Each attempt must open its own transaction so the retry starts from a
/// clean slate. A second `Busy` goes back to the caller.
pub(crate) async fn retry_once_on_busy<T, F, Fut>(op: &'static str, mut attempt: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    match attempt().await {
        Err(err) if err.is_busy() => {
            warn!(op, error = %err, "Store busy, retrying unit of work once");
            attempt().await
        }
        other => other,
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE … ESCAPE '\'` pattern.
pub(crate) fn like_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::{like_pattern, retry_once_on_busy};
    use crate::error::DbError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Para"), "%para%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[tokio::test]
    async fn test_retry_once_on_busy_counts_attempts() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result = retry_once_on_busy("test", move || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DbError::Busy("database is locked".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<(), _> = retry_once_on_busy("test", move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Busy("database is locked".into()))
        })
        .await;
        assert!(result.unwrap_err().is_busy());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<(), _> = retry_once_on_busy("test", move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Internal("boom".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
