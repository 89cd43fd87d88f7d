//! Google Calendar connection.
//!
//! The OAuth `state` is `{user_id}:{return_to}` signed with the auth secret,
//! so the callback can trust whose calendar it is storing without a session.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use echodesk_core::{User, UserId};

use crate::auth::AuthUser;
use crate::crypto::{sign_value, verify_signed_value};
use crate::error::ApiError;
use crate::state::AppState;

/// Calendar used when the account email cannot be read.
const FALLBACK_CALENDAR_ID: &str = "primary";

/// Shown when the grant carries no refresh token.
const NO_REFRESH_TOKEN_MESSAGE: &str =
    "No refresh token received. Please try connecting again and ensure you grant all permissions.";

/// Frontend page the callback returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnTo {
    /// The onboarding flow.
    Onboarding,
    /// The dashboard.
    #[default]
    Dashboard,
}

impl ReturnTo {
    /// Parse a `return_to` value; anything unknown means the dashboard.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "onboarding" => Self::Onboarding,
            _ => Self::Dashboard,
        }
    }

    /// Path segment on the frontend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::Dashboard => "dashboard",
        }
    }
}

/// Connect query.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// `onboarding` or `dashboard`.
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Connect response.
#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    /// Google consent screen URL.
    pub url: String,
}

/// Build the Google consent URL for the current user.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let calendar = state.calendar()?;
    let return_to = ReturnTo::parse(query.return_to.as_deref().unwrap_or_default());
    let oauth_state = sign_value(
        &state.config.auth_jwt_secret,
        &format!("{}:{}", auth.user_id, return_to.as_str()),
    );

    let url = calendar.authorization_url(&oauth_state)?;
    Ok(Json(ConnectResponse { url }))
}

/// OAuth callback query.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    pub code: Option<String>,
    /// Signed state from [`connect`].
    pub state: Option<String>,
    /// Error reported by Google.
    pub error: Option<String>,
}

/// Finish the OAuth flow and redirect to the frontend.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let verified = query
        .state
        .as_deref()
        .filter(|_| !state.config.auth_jwt_secret.is_empty())
        .and_then(|s| verify_signed_value(&state.config.auth_jwt_secret, s))
        .map(parse_state);
    let return_to = verified.map_or(ReturnTo::Dashboard, |(_, r)| r);
    let app_url = &state.config.app_url;

    match complete_connection(&state, &query, verified).await {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "Google Calendar connected");
            frontend_redirect(app_url, return_to, &[("calendar", "connected")])
        }
        Err(message) => {
            tracing::warn!(error = %message, "Google Calendar connection failed");
            frontend_redirect(
                app_url,
                return_to,
                &[("calendar", "error"), ("message", message.as_str())],
            )
        }
    }
}

async fn complete_connection(
    state: &AppState,
    query: &CallbackQuery,
    verified: Option<(Option<UserId>, ReturnTo)>,
) -> Result<UserId, String> {
    if let Some(error) = &query.error {
        return Err(format!("OAuth error: {error}"));
    }
    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "Missing authorization code".to_string())?;
    let user_id = verified
        .and_then(|(user_id, _)| user_id)
        .ok_or_else(|| "Invalid user".to_string())?;

    let mut user: User = match state.store.get_user(&user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err("Invalid user".to_string()),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to load user for calendar callback");
            return Err("Failed to load account".to_string());
        }
    };

    let calendar = state
        .calendar()
        .map_err(|_| "OAuth error: Google OAuth not configured".to_string())?;
    let grant = calendar
        .exchange_code(code)
        .await
        .map_err(|e| format!("OAuth error: {e}"))?;
    let refresh_token = grant
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| NO_REFRESH_TOKEN_MESSAGE.to_string())?;

    let calendar_id = match calendar.fetch_email(&grant.access_token).await {
        Ok(Some(email)) => email,
        Ok(None) => FALLBACK_CALENDAR_ID.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "Could not read Google account email");
            FALLBACK_CALENDAR_ID.to_string()
        }
    };

    user.calendar_refresh_token = Some(refresh_token);
    user.calendar_id = Some(calendar_id);
    user.updated_at = Utc::now();
    state.store.put_user(&user).await.map_err(|e| {
        tracing::error!(user_id = %user_id, error = %e, "Failed to store calendar connection");
        "Failed to save calendar connection".to_string()
    })?;

    Ok(user_id)
}

/// Split a verified state payload.
fn parse_state(payload: &str) -> (Option<UserId>, ReturnTo) {
    let (user, return_to) = payload
        .split_once(':')
        .map_or((payload, ReturnTo::Dashboard), |(u, r)| {
            (u, ReturnTo::parse(r))
        });
    (user.parse().ok(), return_to)
}

fn frontend_redirect(app_url: &str, return_to: ReturnTo, params: &[(&str, &str)]) -> Redirect {
    let base = format!("{app_url}/{}", return_to.as_str());
    let target = match reqwest::Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(params);
            url.to_string()
        }
        Err(_) => base,
    };
    Redirect::to(&target)
}
