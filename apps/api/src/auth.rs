//! JWT authentication module.
//!
//! Issues and validates access tokens, keeps the revoked-token cache, and
//! provides the middleware that guards every route except login and health.
//!
//! ```text
//!  request ──► require_auth ──► Bearer token? ──► JwtManager::validate
//!                                                      │
//!                                   RevokedTokens::is_revoked(jti)?
//!                                                      │
//!                         extensions.insert(Principal) ▼
//!                                                  handler
//!                                     Principal::context() → RequestContext
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use apotek_core::{RequestContext, User};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

// =============================================================================
// Tokens
// =============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// User id
    pub uid: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID, the key for revocation
    pub jti: String,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, access_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token for `user`.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_lifetime_secs);

        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Validate and decode a token (HS256, expiry checked).
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let token = auth_header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

// =============================================================================
// Revoked Tokens
// =============================================================================

/// Logged-out token ids, each kept until its token would have expired.
#[derive(Debug, Clone, Default)]
pub struct RevokedTokens {
    entries: Arc<RwLock<HashMap<String, i64>>>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes `jti` until `expires_at` (Unix seconds).
    pub async fn revoke(&self, jti: &str, expires_at: i64) {
        self.entries
            .write()
            .await
            .insert(jti.to_string(), expires_at);
    }

    pub async fn is_revoked(&self, jti: &str) -> bool {
        let now = Utc::now().timestamp();
        self.entries
            .read()
            .await
            .get(jti)
            .is_some_and(|exp| *exp > now)
    }

    /// Drops entries whose tokens have expired anyway.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        before - entries.len()
    }

    /// Purges expired entries every `period`.
    ///
    /// This should be spawned as a background task; it runs until aborted.
    pub async fn run_purge_loop(self, period: std::time::Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let purged = self.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Purged expired revoked tokens");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// The authenticated caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub jti: String,
    pub expires_at: i64,
}

impl Principal {
    /// The context handed to the ledger engine.
    pub fn context(&self) -> RequestContext {
        RequestContext::new(&self.username)
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal {
            user_id: claims.uid,
            username: claims.sub,
            jti: claims.jti,
            expires_at: claims.exp,
        }
    }
}

/// Rejects requests without a valid, unrevoked bearer token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = extract_bearer_token(header)
        .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".to_string()))?;

    let claims = state.jwt.validate(token).map_err(|err| {
        debug!(error = %err, "Token rejected");
        err
    })?;

    if state.revoked.is_revoked(&claims.jti).await {
        warn!(user = %claims.sub, jti = %claims.jti, "Revoked token presented");
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }

    req.extensions_mut().insert(Principal::from(claims));
    Ok(next.run(req).await)
}
