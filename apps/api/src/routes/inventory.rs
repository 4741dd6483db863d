//! Inventory routes.
//!
//! Updates go through an allow-list: only the fields below reach the
//! store, anything else in the body is logged and dropped.
//!
//! ```text
//! wire key        InventoryUpdate field
//! ─────────────   ─────────────────────
//! nama_item       name
//! kategori        category   (null or "" clears)
//! stok_minimum    quantity_minimum
//! harga           unit_price
//! stok_tersedia   quantity_available
//! ```

use std::sync::Arc;

use apotek_core::{
    InventoryFilter, InventoryKey, InventoryRecord, InventoryUpdate, NewInventory,
    ValidationError, DEFAULT_QUANTITY_MINIMUM,
};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use ts_rs::TS;

use crate::auth::Principal;
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::MessageResponse;
use crate::routes::{required, DecimalInput};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/inventory", get(list_inventory).post(create_inventory))
        .route("/inventory/low-stock", get(low_stock))
        .route(
            "/inventory/{sku}/{batch}",
            get(get_inventory).put(update_inventory).delete(delete_inventory),
        )
}

// =============================================================================
// DTOs
// =============================================================================

/// An inventory record on the wire.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct InventoryView {
    pub sku: String,
    pub batch_number: String,
    pub nama_item: String,
    pub kategori: Option<String>,
    pub stok_tersedia: i64,
    pub stok_minimum: i64,
    pub harga: f64,
    #[ts(as = "String")]
    pub waktu_pembaruan: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl From<InventoryRecord> for InventoryView {
    fn from(record: InventoryRecord) -> Self {
        InventoryView {
            harga: record.unit_price().to_major_f64(),
            sku: record.sku,
            batch_number: record.batch_number,
            nama_item: record.name,
            kategori: record.category,
            stok_tersedia: record.quantity_available,
            stok_minimum: record.quantity_minimum,
            waktu_pembaruan: record.last_updated,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInventoryRequest {
    pub sku: Option<String>,
    pub batch_number: Option<String>,
    pub nama_item: Option<String>,
    pub kategori: Option<String>,
    pub stok_tersedia: Option<i64>,
    pub stok_minimum: Option<i64>,
    pub harga: Option<DecimalInput>,
}

impl CreateInventoryRequest {
    fn into_new_inventory(self) -> Result<NewInventory, ValidationError> {
        let harga = required(self.harga, "harga")?;
        Ok(NewInventory {
            sku: required(self.sku, "sku")?,
            batch_number: required(self.batch_number, "batch_number")?,
            name: required(self.nama_item, "nama_item")?,
            category: self.kategori.filter(|c| !c.trim().is_empty()),
            quantity_available: self.stok_tersedia.unwrap_or(0),
            quantity_minimum: self.stok_minimum.unwrap_or(DEFAULT_QUANTITY_MINIMUM),
            unit_price: harga.to_money("harga")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /inventory?category&search`
pub async fn list_inventory(
    State(state): State<Arc<AppState>>,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<InventoryView>>> {
    let Query(query) = query?;

    let filter = InventoryFilter {
        category: query.category,
        search: query.search,
    };

    let records = state.db.inventory().list(&filter).await?;
    Ok(Json(records.into_iter().map(InventoryView::from).collect()))
}

/// `GET /inventory/low-stock`
pub async fn low_stock(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<InventoryView>>> {
    let records = state.db.queries().low_stock().await?;
    Ok(Json(records.into_iter().map(InventoryView::from).collect()))
}

/// `POST /inventory`
pub async fn create_inventory(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateInventoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InventoryView>)> {
    let Json(body) = payload?;
    let input = body.into_new_inventory()?;

    let record = state.db.inventory().create(input).await?;
    info!(key = %record.key(), actor = %principal.username, "Inventory created via API");

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// `GET /inventory/{sku}/{batch}`
pub async fn get_inventory(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<InventoryView>> {
    let Path((sku, batch)) = path?;
    let record = state
        .db
        .inventory()
        .require(&InventoryKey::new(sku, batch))
        .await?;
    Ok(Json(record.into()))
}

/// `PUT /inventory/{sku}/{batch}`
pub async fn update_inventory(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<InventoryView>> {
    let Path((sku, batch)) = path?;
    let Json(body) = payload?;
    let key = InventoryKey::new(sku, batch);

    let (update, ignored) = build_update(body)?;
    if !ignored.is_empty() {
        warn!(key = %key, fields = ?ignored, "Ignoring fields that cannot be updated");
    }

    let record = state.db.inventory().update_fields(&key, &update).await?;
    info!(key = %key, actor = %principal.username, "Inventory updated via API");

    Ok(Json(record.into()))
}

/// `DELETE /inventory/{sku}/{batch}`
pub async fn delete_inventory(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path((sku, batch)) = path?;
    let key = InventoryKey::new(sku, batch);

    state.db.inventory().delete(&key).await?;
    info!(key = %key, actor = %principal.username, "Inventory deleted via API");

    Ok(Json(MessageResponse {
        message: format!("Inventory {} deleted", key),
    }))
}

// =============================================================================
// Allow-list
// =============================================================================

/// Builds an [`InventoryUpdate`] from the allow-listed keys of `body`.
///
/// Returns the update and the keys that were ignored.
fn build_update(body: Map<String, Value>) -> Result<(InventoryUpdate, Vec<String>), ApiError> {
    let mut update = InventoryUpdate::default();
    let mut ignored = Vec::new();

    for (field, value) in body {
        match field.as_str() {
            "nama_item" => update.name = Some(string_field(&field, value)?),
            "kategori" => {
                update.category = Some(match value {
                    Value::Null => String::new(),
                    other => string_field(&field, other)?,
                })
            }
            "stok_minimum" => update.quantity_minimum = Some(integer_field(&field, &value)?),
            "stok_tersedia" => update.quantity_available = Some(integer_field(&field, &value)?),
            "harga" => {
                let input: DecimalInput =
                    serde_json::from_value(value).map_err(|_| invalid(&field, "expected a number"))?;
                update.unit_price = Some(input.to_money(&field)?);
            }
            _ => ignored.push(field),
        }
    }

    Ok((update, ignored))
}

fn string_field(field: &str, value: Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(field, "expected a string")),
    }
}

fn integer_field(field: &str, value: &Value) -> Result<i64, ValidationError> {
    value
        .as_i64()
        .ok_or_else(|| invalid(field, "expected an integer"))
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apotek_core::Money;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_build_update_allow_list() {
        let (update, mut ignored) = build_update(body(json!({
            "nama_item": "Paracetamol",
            "harga": "12.50",
            "stok_minimum": 5,
            "sku": "HACK",
            "is_admin": true
        })))
        .unwrap();

        assert_eq!(update.name.as_deref(), Some("Paracetamol"));
        assert_eq!(update.unit_price, Some(Money::from_cents(1_250)));
        assert_eq!(update.quantity_minimum, Some(5));
        assert_eq!(update.quantity_available, None);

        ignored.sort();
        assert_eq!(ignored, vec!["is_admin".to_string(), "sku".to_string()]);
    }

    #[test]
    fn test_build_update_null_category_clears() {
        let (update, _) = build_update(body(json!({ "kategori": null }))).unwrap();
        assert_eq!(update.category.as_deref(), Some(""));
    }

    #[test]
    fn test_build_update_type_errors() {
        assert!(build_update(body(json!({ "stok_tersedia": "many" }))).is_err());
        assert!(build_update(body(json!({ "nama_item": 42 }))).is_err());
        assert!(build_update(body(json!({ "harga": [1] }))).is_err());
    }

    #[test]
    fn test_create_request_requires_fields() {
        let request: CreateInventoryRequest =
            serde_json::from_value(json!({ "sku": "A", "batch_number": "B", "harga": 10 })).unwrap();
        let err = request.into_new_inventory().unwrap_err();
        assert!(matches!(err, ValidationError::Required { ref field } if field == "nama_item"));
    }
}
