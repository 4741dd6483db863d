//! Login and logout.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;

use crate::auth::Principal;
use crate::error::{ApiError, ApiResult};
use crate::routes::required;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(body) = payload?;
    let username = required(body.username, "username")?;
    let password = required(body.password, "password")?;

    let user = match state.db.users().verify_credentials(&username, &password).await? {
        Some(user) => user,
        None => {
            warn!(username = %username, "Login failed");
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }
    };

    let issued = state.jwt.issue(&user)?;
    info!(username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_lifetime_secs(),
    }))
}

/// `POST /logout`: revokes the presented token until it expires.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .revoked
        .revoke(&principal.jti, principal.expires_at)
        .await;

    info!(username = %principal.username, "User logged out");

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
