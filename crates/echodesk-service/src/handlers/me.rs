//! Current user handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use echodesk_core::plans::{plan_display_label, plan_price_label};
use echodesk_core::{normalize_phone, User};

use crate::auth::AuthUser;
use crate::billing::backfill_plan;
use crate::error::ApiError;
use crate::state::AppState;

/// Profile response.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// User ID.
    pub id: String,
    /// Email address.
    pub email: Option<String>,
    /// Default business phone.
    pub phone: Option<String>,
    /// Default calendar.
    pub calendar_id: Option<String>,
    /// Whether Google Calendar is connected.
    pub calendar_connected: bool,
    /// Subscription status.
    pub subscription_status: String,
    /// Derived billing plan.
    pub billing_plan: Option<String>,
    /// Human-readable plan name.
    pub plan_label: String,
    /// Short price label.
    pub plan_price_label: String,
    /// Whether the first receptionist was created.
    pub onboarding_completed: bool,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&User> for MeResponse {
    fn from(user: &User) -> Self {
        let metadata = user.billing_plan_metadata.as_ref();
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            calendar_id: user.calendar_id.clone(),
            calendar_connected: user.has_calendar(),
            subscription_status: user.subscription_status.as_str().to_string(),
            billing_plan: user.billing_plan.clone(),
            plan_label: plan_display_label(user.billing_plan.as_deref(), metadata),
            plan_price_label: plan_price_label(user.billing_plan.as_deref(), metadata),
            onboarding_completed: user.onboarding_completed_at.is_some(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Get the current user's profile.
///
/// An active subscriber without a recorded plan gets it filled in first.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let mut user = auth.user;

    if let Some(billing) = &state.billing {
        backfill_plan(
            state.store.as_ref(),
            billing.as_ref(),
            &state.plans,
            &mut user,
            Utc::now(),
        )
        .await?;
    }

    Ok(Json(MeResponse::from(&user)))
}

/// Update phone request.
#[derive(Debug, Deserialize)]
pub struct UpdatePhoneRequest {
    /// Default business phone, any common format.
    pub phone: String,
}

/// Save the default business phone.
pub async fn update_phone(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<UpdatePhoneRequest>,
) -> Result<Json<MeResponse>, ApiError> {
    let phone = normalize_phone(&body.phone)?;

    let mut user = auth.user;
    user.phone = Some(phone);
    user.updated_at = Utc::now();
    state.store.put_user(&user).await?;

    tracing::info!(user_id = %user.id, "Default phone updated");
    Ok(Json(MeResponse::from(&user)))
}
