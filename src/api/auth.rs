//! JWT auth for the API.
//!
//! - Clients submit a username and password to `/api/auth/login`
//! - Server returns a JWT valid for `JWT_TTL_DAYS`
//! - Unless `DEV_MODE` is set, every other endpoint requires
//!   `Authorization: Bearer <jwt>`
//!
//! Accounts come from `AUTH_USERS`; a token stays valid only while its
//! account is still configured.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::error::ApiError;
use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};
use crate::config::{AuthConfig, UserRole};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Username
    sub: String,
    role: UserRole,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self.role {
            UserRole::Admin => Ok(()),
            UserRole::User => Err(ApiError::forbidden("Access denied")),
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a_bytes.iter().zip(b_bytes) {
        diff |= x ^ y;
    }
    diff == 0
}

fn issue_jwt(secret: &str, ttl_days: i64, user: &AuthUser) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.username.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Check a password against the configured accounts.
fn authenticate(auth: &AuthConfig, username: &str, password: &str) -> Option<AuthUser> {
    match auth.find_user(username.trim()) {
        Some(account) if constant_time_eq(password, &account.password) => Some(AuthUser {
            username: account.username.clone(),
            role: account.role,
        }),
        Some(_) => None,
        None => {
            // Same work for unknown users as for wrong passwords.
            let _ = constant_time_eq(password, "dummy_password_for_timing");
            None
        }
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let auth = &state.config.auth;
    let Some(user) = authenticate(auth, &req.username, &req.password) else {
        tracing::info!(username = %req.username.trim(), "Rejected login");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let secret = auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| ApiError::internal("JWT_SECRET not configured"))?;

    let (token, exp) = issue_jwt(secret, auth.jwt_ttl_days, &user)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::info!(username = %user.username, "User logged in");
    Ok(Json(LoginResponse {
        status: "success",
        token,
        exp,
        username: user.username,
        role: user.role,
    }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if !state.config.auth.auth_required(state.config.dev_mode) {
        req.extensions_mut().insert(AuthUser {
            username: "dev".to_string(),
            role: UserRole::Admin,
        });
        return next.run(req).await;
    }

    // Fail closed when no secret is configured.
    let Some(secret) = state.config.auth.jwt_secret.as_deref() else {
        return ApiError::internal("JWT_SECRET not configured").into_response();
    };

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return ApiError::unauthorized("Missing Authorization header").into_response();
    }

    let claims = match verify_jwt(token, secret) {
        Ok(claims) => claims,
        Err(_) => return ApiError::unauthorized("Invalid or expired token").into_response(),
    };

    // Role comes from the current account, not the token.
    let Some(account) = state.config.auth.find_user(&claims.sub) else {
        return ApiError::unauthorized("Invalid user").into_response();
    };
    req.extensions_mut().insert(AuthUser {
        username: account.username.clone(),
        role: account.role,
    });
    next.run(req).await
}
