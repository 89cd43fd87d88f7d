//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AuthUser` - End-user authentication via the hosted auth provider's JWT
//! - `CronAuth` - Scheduler authentication via `CRON_SECRET`
//! - `VoiceServerAuth` - Voice server authentication via `x-voice-server-key`

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use echodesk_core::{User, UserId};

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the voice server key.
pub const VOICE_SERVER_KEY_HEADER: &str = "x-voice-server-key";

/// An authenticated user, with their account row ensured to exist.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// Email claim, if present.
    pub email: Option<String>,
    /// The account row.
    pub user: User,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
            let claims = validate_jwt(token, state)?;

            let user_id = claims
                .sub
                .parse::<UserId>()
                .map_err(|_| ApiError::Unauthorized)?;

            let email = claims.email.filter(|e| !e.is_empty());
            let user = state.store.ensure_user(&user_id, email.as_deref()).await?;

            Ok(AuthUser {
                user_id,
                email,
                user,
            })
        })
    }
}

/// Scheduler authentication.
///
/// Requires `Authorization: Bearer {CRON_SECRET}` when a secret is configured.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

impl FromRequestParts<Arc<AppState>> for CronAuth {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let Some(expected) = state.config.cron_secret.as_deref() else {
                return Ok(CronAuth);
            };

            let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
            if !constant_time_eq(token, expected) {
                tracing::warn!("Cron request with invalid secret");
                return Err(ApiError::Unauthorized);
            }

            Ok(CronAuth)
        })
    }
}

/// Voice server authentication.
///
/// Requires the `x-voice-server-key` header when a key is configured.
#[derive(Debug, Clone, Copy)]
pub struct VoiceServerAuth;

impl FromRequestParts<Arc<AppState>> for VoiceServerAuth {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let Some(expected) = state.config.voice_server_api_key.as_deref() else {
                return Ok(VoiceServerAuth);
            };

            let key = parts
                .headers
                .get(VOICE_SERVER_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            if !constant_time_eq(key, expected) {
                return Err(ApiError::Unauthorized);
            }

            Ok(VoiceServerAuth)
        })
    }
}

/// JWT claims of the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Email of the signed-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Audience (can be string or array).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    /// Expiration time.
    pub exp: i64,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validate an HS256 token against the shared secret.
fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    if state.config.auth_jwt_secret.is_empty() {
        tracing::warn!("AUTH_JWT_SECRET not configured - rejecting user request");
        return Err(ApiError::Unauthorized);
    }

    let key = DecodingKey::from_secret(state.config.auth_jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&state.config.auth_audience]);

    let token_data = decode::<JwtClaims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}
