//! Error types for the API.
//!
//! Every failure leaves the server as `{"code", "message"}` JSON. Internal
//! details are logged and replaced by a generic message.
//!
//! ```text
//! DbError / CoreError          HTTP   code
//! ──────────────────────────   ────   ──────────────────
//! ProductNotFound, NotFound     404    not_found
//! TransactionNotFound           404    not_found
//! DuplicateInventory, Unique    409    conflict
//! InventoryReferenced, FK       409    conflict
//! InsufficientStock             400    insufficient_stock (+ available, requested)
//! Validation, Empty, Mismatch   400    validation_error
//! Busy, PoolExhausted           503    busy
//! anything else                 500    internal_error
//! ```

use apotek_core::{CoreError, ValidationError};
use apotek_db::DbError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Db(DbError::Core(err))
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::from(CoreError::Validation(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<i64>,
}

impl ErrorBody {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        ErrorBody {
            code,
            message: message.into(),
            available: None,
            requested: None,
        }
    }
}

impl ApiError {
    /// Status code and body for this error.
    pub fn to_parts(&self) -> (StatusCode, ErrorBody) {
        match self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("unauthorized", msg.clone()))
            }
            ApiError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("validation_error", msg.clone()),
            ),
            ApiError::Db(err) => db_parts(err),
            ApiError::Internal(_) => internal(),
        }
    }
}

fn db_parts(err: &DbError) -> (StatusCode, ErrorBody) {
    let message = err.to_string();
    match err {
        DbError::Core(core) => core_parts(core),
        DbError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorBody::new("not_found", message)),
        DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
            (StatusCode::CONFLICT, ErrorBody::new("conflict", message))
        }
        DbError::Busy(_) | DbError::PoolExhausted => (
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorBody::new("busy", "The store is busy, please retry"),
        ),
        DbError::ConnectionFailed(_)
        | DbError::MigrationFailed(_)
        | DbError::QueryFailed(_)
        | DbError::Internal(_) => internal(),
    }
}

fn core_parts(err: &CoreError) -> (StatusCode, ErrorBody) {
    let message = err.to_string();
    match err {
        CoreError::ProductNotFound { .. } | CoreError::TransactionNotFound(_) => {
            (StatusCode::NOT_FOUND, ErrorBody::new("not_found", message))
        }
        CoreError::DuplicateInventory { .. } | CoreError::InventoryReferenced { .. } => {
            (StatusCode::CONFLICT, ErrorBody::new("conflict", message))
        }
        CoreError::InsufficientStock {
            available,
            requested,
            ..
        } => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                code: "insufficient_stock",
                message,
                available: Some(*available),
                requested: Some(*requested),
            },
        ),
        CoreError::EmptyTransaction | CoreError::TotalMismatch { .. } | CoreError::Validation(_) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("validation_error", message),
        ),
    }
}

fn internal() -> (StatusCode, ErrorBody) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody::new("internal_error", "Internal server error"),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_parts();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_carries_quantities() {
        let err = ApiError::from(CoreError::InsufficientStock {
            sku: "TEST001".to_string(),
            batch_number: "B001".to_string(),
            available: 50,
            requested: 60,
        });
        let (status, body) = err.to_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "insufficient_stock");
        assert_eq!(body.available, Some(50));
        assert_eq!(body.requested, Some(60));
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (CoreError::TransactionNotFound(7).into(), StatusCode::NOT_FOUND),
            (
                CoreError::DuplicateInventory {
                    sku: "A".into(),
                    batch_number: "B".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (CoreError::EmptyTransaction.into(), StatusCode::BAD_REQUEST),
            (DbError::Busy("locked".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
            (DbError::duplicate("username", "admin").into(), StatusCode::CONFLICT),
            (ApiError::Unauthorized("no token".into()), StatusCode::UNAUTHORIZED),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_parts().0, expected, "{err}");
        }
    }

    #[test]
    fn test_internal_detail_is_not_leaked() {
        let err = ApiError::from(DbError::QueryFailed("no such table: secret".into()));
        let (status, body) = err.to_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("secret"));
    }
}
