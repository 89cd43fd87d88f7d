//! Scheduled jobs, triggered by an external scheduler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::auth::CronAuth;
use crate::billing::invoice_previous_month;
use crate::state::AppState;
use crate::usage::UsageAggregator;

fn job_failed(job: &'static str, error: impl std::fmt::Display) -> Response {
    tracing::error!(job, error = %error, "Scheduled job failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": error.to_string() })),
    )
        .into_response()
}

/// Recompute this month's usage snapshot of every receptionist.
pub async fn run_usage(State(state): State<Arc<AppState>>, _auth: CronAuth) -> Response {
    match UsageAggregator::new(Arc::clone(&state.store))
        .aggregate_current_month(Utc::now())
        .await
    {
        Ok(outcome) => Json(json!({
            "ok": true,
            "updated": outcome.updated,
            "errors": outcome.errors,
        }))
        .into_response(),
        Err(e) => job_failed("usage", e),
    }
}

/// Invoice last month's pay-as-you-go usage.
pub async fn run_billing(State(state): State<Arc<AppState>>, _auth: CronAuth) -> Response {
    let billing = match state.billing() {
        Ok(billing) => billing,
        Err(e) => return job_failed("billing", e),
    };

    match invoice_previous_month(state.store.as_ref(), billing.as_ref(), Utc::now()).await {
        Ok(summary) => Json(json!({
            "ok": true,
            "invoiced": summary.invoiced,
            "skipped": summary.skipped,
            "errors": summary.errors,
        }))
        .into_response(),
        Err(e) => job_failed("billing", e),
    }
}
