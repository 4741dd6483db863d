//! Transaction routes.
//!
//! Thin wrappers over [`apotek_db::LedgerWriter`]: parse the item list,
//! turn the principal into a `RequestContext`, render the receipt.

use std::str::FromStr;
use std::sync::Arc;

use apotek_core::{LedgerEntry, LineRequest, TransactionHeader, TransactionKind, TransactionLine};
use apotek_db::{LedgerReceipt, ReversalReceipt};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::auth::Principal;
use crate::error::{ApiError, ApiResult};
use crate::routes::required;
use crate::AppState;

/// Default page size for the transaction listing.
const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/monthly-sales", get(monthly_sales))
        .route(
            "/transactions/{id}",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

// =============================================================================
// Request DTOs
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LineItemInput {
    pub sku: Option<String>,
    #[serde(alias = "batch")]
    pub batch_number: Option<String>,
    pub jumlah: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    pub jenis_transaksi: Option<String>,
}

impl TransactionRequest {
    fn line_requests(self) -> ApiResult<Vec<LineRequest>> {
        self.items
            .into_iter()
            .map(|item| -> ApiResult<LineRequest> {
                Ok(LineRequest::new(
                    required(item.sku, "sku")?,
                    required(item.batch_number, "batch_number")?,
                    required(item.jumlah, "jumlah")?,
                ))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlySalesQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

// =============================================================================
// Response DTOs
// =============================================================================

/// One line of a transaction on the wire.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct LineView {
    pub sku: String,
    pub batch_number: String,
    pub nama_item: String,
    pub jumlah: i64,
    pub harga_satuan: f64,
    pub subtotal: f64,
    /// Stock left after this line was applied; only on create/update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sisa_stok: Option<i64>,
}

impl LineView {
    fn new(line: TransactionLine, remaining_stock: Option<i64>) -> Self {
        LineView {
            harga_satuan: line.unit_price().to_major_f64(),
            subtotal: line.subtotal().to_major_f64(),
            sku: line.sku,
            batch_number: line.batch_number,
            nama_item: line.item_name_snapshot,
            jumlah: line.quantity,
            sisa_stok: remaining_stock,
        }
    }
}

/// Result of a create or update.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct TransactionReceiptView {
    pub transaction_id: i64,
    pub jenis_transaksi: String,
    pub total: f64,
    pub details: Vec<LineView>,
}

impl From<LedgerReceipt> for TransactionReceiptView {
    fn from(receipt: LedgerReceipt) -> Self {
        TransactionReceiptView {
            transaction_id: receipt.header.id,
            jenis_transaksi: receipt.header.kind.wire_name().to_string(),
            total: receipt.total().to_major_f64(),
            details: receipt
                .lines
                .into_iter()
                .map(|r| LineView::new(r.line, Some(r.remaining_stock)))
                .collect(),
        }
    }
}

/// A stored transaction header, optionally with its lines.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct TransactionView {
    pub transaction_id: i64,
    pub jenis_transaksi: String,
    pub total: f64,
    pub dicatat_oleh: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<LineView>>,
}

impl TransactionView {
    fn new(header: TransactionHeader, lines: Option<Vec<TransactionLine>>) -> Self {
        TransactionView {
            transaction_id: header.id,
            jenis_transaksi: header.kind.wire_name().to_string(),
            total: header.total_amount().to_major_f64(),
            dicatat_oleh: header.recorded_by,
            created_at: header.created_at,
            updated_at: header.updated_at,
            details: lines.map(|lines| lines.into_iter().map(|l| LineView::new(l, None)).collect()),
        }
    }
}

impl From<LedgerEntry> for TransactionView {
    fn from(entry: LedgerEntry) -> Self {
        TransactionView::new(entry.header, Some(entry.lines))
    }
}

/// One line given back by a delete.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ReturnedLineView {
    pub sku: String,
    pub batch_number: String,
    pub jumlah_dikembalikan: i64,
    pub stok_sekarang: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct DeleteTransactionView {
    pub message: String,
    pub transaction_id: i64,
    pub jenis_transaksi: String,
    pub details: Vec<ReturnedLineView>,
}

impl From<ReversalReceipt> for DeleteTransactionView {
    fn from(receipt: ReversalReceipt) -> Self {
        DeleteTransactionView {
            message: format!("Transaction {} deleted", receipt.transaction_id),
            transaction_id: receipt.transaction_id,
            jenis_transaksi: receipt.kind.wire_name().to_string(),
            details: receipt
                .lines
                .into_iter()
                .map(|l| ReturnedLineView {
                    sku: l.sku,
                    batch_number: l.batch_number,
                    jumlah_dikembalikan: l.quantity_returned,
                    stok_sekarang: l.stock_after,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct MonthlySalesView {
    pub year: i32,
    pub month: u32,
    pub total_sales: f64,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /transactions?limit&offset`, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<TransactionView>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let headers = state.db.transactions().list(limit, offset).await?;
    Ok(Json(
        headers
            .into_iter()
            .map(|h| TransactionView::new(h, None))
            .collect(),
    ))
}

/// `GET /transactions/{id}`
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TransactionView>> {
    let Path(id) = path?;
    let entry = state
        .db
        .transactions()
        .get_entry(id)
        .await?
        .ok_or(apotek_core::CoreError::TransactionNotFound(id))?;
    Ok(Json(entry.into()))
}

/// `POST /transactions`
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransactionReceiptView>)> {
    let Json(body) = payload?;
    let kind = match body.jenis_transaksi.as_deref() {
        Some(raw) => TransactionKind::from_str(raw)?,
        None => TransactionKind::default(),
    };
    let lines = body.line_requests()?;

    let receipt = state
        .db
        .ledger()
        .create(&principal.context(), kind, &lines)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// `PUT /transactions/{id}`
///
/// The kind of an existing transaction never changes; a `jenis_transaksi`
/// in the body is ignored.
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> ApiResult<Json<TransactionReceiptView>> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let lines = body.line_requests()?;

    let receipt = state
        .db
        .ledger()
        .update(&principal.context(), id, &lines)
        .await?;

    Ok(Json(receipt.into()))
}

/// `DELETE /transactions/{id}`
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<DeleteTransactionView>> {
    let Path(id) = path?;
    let receipt = state.db.ledger().delete(&principal.context(), id).await?;
    Ok(Json(receipt.into()))
}

/// `GET /transactions/monthly-sales?year&month`
///
/// Missing parameters default to the current UTC year and month.
pub async fn monthly_sales(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MonthlySalesQuery>, QueryRejection>,
) -> ApiResult<Json<MonthlySalesView>> {
    let Query(query) = query?;
    let now = Utc::now();
    let year = query.year.unwrap_or_else(|| now.year());
    let month = query.month.unwrap_or_else(|| now.month());

    let sales = state.db.queries().monthly_sales(year, month).await?;

    Ok(Json(MonthlySalesView {
        year: sales.year,
        month: sales.month,
        total_sales: sales.total.to_major_f64(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_requests_accept_batch_alias() {
        let request: TransactionRequest = serde_json::from_value(json!({
            "items": [{ "sku": "TEST001", "batch": "B001", "jumlah": 5 }]
        }))
        .unwrap();
        let lines = request.line_requests().unwrap();
        assert_eq!(lines, vec![LineRequest::new("TEST001", "B001", 5)]);
    }

    #[test]
    fn test_line_requests_missing_field() {
        let request: TransactionRequest = serde_json::from_value(json!({
            "items": [{ "sku": "TEST001", "batch_number": "B001" }]
        }))
        .unwrap();
        assert!(matches!(request.line_requests(), Err(ApiError::Db(_))));
    }

    #[test]
    fn test_missing_items_is_empty() {
        let request: TransactionRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.line_requests().unwrap().is_empty());
    }
}
