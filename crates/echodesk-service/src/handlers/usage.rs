//! Usage handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use echodesk_core::usage::billable_minutes;
use echodesk_core::BillingPeriod;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::receptionists::parse_receptionist_id;
use crate::ownership::authorize_receptionist;
use crate::state::AppState;
use crate::usage::UsageAggregator;

/// Usage of the current period.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    /// Receptionist ID.
    pub receptionist_id: String,
    /// First day of the period.
    pub period_start: String,
    /// Last day of the period.
    pub period_end: String,
    /// Sum of call durations.
    pub total_seconds: i64,
    /// Billable minutes.
    pub minutes: i64,
    /// Plan allowance; absent for uncapped plans.
    pub included_minutes: Option<i64>,
    /// Minutes beyond the allowance.
    pub overage_minutes: i64,
    /// Owner's billing plan.
    pub billing_plan: Option<String>,
}

/// Refresh and return the current month's usage snapshot.
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UsageResponse>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let now = Utc::now();
    let period = BillingPeriod::current_month(now);
    UsageAggregator::new(Arc::clone(&state.store))
        .aggregate(&id, &period, now)
        .await?;

    let snapshot = state
        .store
        .get_usage_snapshot(&id, period.start)
        .await?
        .ok_or_else(|| ApiError::Internal("usage snapshot missing after aggregation".into()))?;

    Ok(Json(UsageResponse {
        receptionist_id: id.to_string(),
        period_start: snapshot.period_start.to_string(),
        period_end: snapshot.period_end.to_string(),
        total_seconds: snapshot.total_seconds,
        minutes: billable_minutes(snapshot.total_seconds),
        included_minutes: snapshot.included_minutes,
        overage_minutes: snapshot.overage_minutes,
        billing_plan: snapshot.billing_plan,
    }))
}
