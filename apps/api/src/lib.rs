//! # Apotek API
//!
//! REST server for the pharmacy stock ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Apotek API Routes                              │
//! │                                                                         │
//! │  public                        protected (require_auth)                │
//! │  ┌────────────────┐            ┌────────────────────────────────────┐  │
//! │  │ GET  /health   │            │ POST   /logout                     │  │
//! │  │ POST /login    │            │ GET    /inventory[?category,search]│  │
//! │  └────────────────┘            │ GET    /inventory/low-stock        │  │
//! │                                │ POST   /inventory                  │  │
//! │                                │ GET    /inventory/{sku}/{batch}    │  │
//! │                                │ PUT    /inventory/{sku}/{batch}    │  │
//! │                                │ DELETE /inventory/{sku}/{batch}    │  │
//! │                                │ GET    /transactions               │  │
//! │                                │ POST   /transactions               │  │
//! │                                │ GET    /transactions/monthly-sales │  │
//! │                                │ GET    /transactions/{id}          │  │
//! │                                │ PUT    /transactions/{id}          │  │
//! │                                │ DELETE /transactions/{id}          │  │
//! │                                └────────────────────────────────────┘  │
//! │                                                                         │
//! │  TraceLayer ─ CorsLayer ─ Router ─ AppState { Database, JwtManager,    │
//! │                                               RevokedTokens }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HOST` / `PORT` - Listener address (default: 0.0.0.0:8080)
//! - `DATABASE_PATH` - SQLite file (default: ./apotek.db)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `DB_BUSY_TIMEOUT_MS` - Write-lock wait before `Busy` (default: 5000)
//! - `JWT_SECRET` - Secret for JWT signing
//! - `JWT_ACCESS_LIFETIME_SECS` - Access token lifetime (default: 3600)
//! - `LOW_STOCK_COMPARISON` - `inclusive` or `strict` (default: inclusive)
//! - `SKU_FIELD_POLICY` - `independent` or `shared` (default: independent)
//! - `RUST_LOG` - Log filter (default: info)

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use apotek_db::Database;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Re-exports
pub use auth::{JwtManager, Principal, RevokedTokens};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub jwt: JwtManager,
    pub revoked: RevokedTokens,
}

impl AppState {
    pub fn new(db: Database, config: &ApiConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_access_lifetime_secs);
        AppState {
            db,
            jwt,
            revoked: RevokedTokens::new(),
        }
    }
}

/// Builds the full HTTP router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logout", post(routes::auth::logout))
        .merge(routes::inventory::router())
        .merge(routes::transactions::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/login", post(routes::auth::login))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
