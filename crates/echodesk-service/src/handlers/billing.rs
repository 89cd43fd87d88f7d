//! Subscription checkout, the checkout-return sync and the billing portal.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use echodesk_core::money::{format_cents, format_whole_dollars};
use echodesk_core::{PlanDefinition, PlanId};

use crate::auth::AuthUser;
use crate::billing::{sync_checkout_session, SyncOutcome};
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::CheckoutRequest;

/// One purchasable plan.
#[derive(Debug, Serialize)]
pub struct PlanEntry {
    /// Plan identifier, as accepted by checkout.
    pub id: String,
    /// Display name.
    pub name: String,
    /// `subscription` or `per_minute`.
    pub kind: &'static str,
    /// Short price label.
    pub price_label: String,
    /// Minutes included per month (subscription plans).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_minutes: Option<i64>,
    /// Monthly price or base fee in cents.
    pub monthly_cents: i64,
    /// Rate per minute in cents (pay-as-you-go).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_minute_cents: Option<i64>,
}

impl From<PlanId> for PlanEntry {
    fn from(plan: PlanId) -> Self {
        match plan.definition() {
            PlanDefinition::Subscription(p) => Self {
                id: plan.to_string(),
                name: p.name.to_string(),
                kind: "subscription",
                price_label: format!("${}/mo", format_whole_dollars(p.price_cents)),
                included_minutes: Some(p.included_minutes),
                monthly_cents: p.price_cents,
                per_minute_cents: None,
            },
            PlanDefinition::PerMinute(t) => Self {
                id: plan.to_string(),
                name: t.name.to_string(),
                kind: "per_minute",
                price_label: format!(
                    "${} + ${}/min",
                    format_whole_dollars(t.monthly_fee_cents),
                    format_cents(t.per_minute_cents)
                ),
                included_minutes: None,
                monthly_cents: t.monthly_fee_cents,
                per_minute_cents: Some(t.per_minute_cents),
            },
        }
    }
}

/// Plans response.
#[derive(Debug, Serialize)]
pub struct PlansResponse {
    /// Plans with a checkout price configured.
    pub plans: Vec<PlanEntry>,
}

/// List the plans that can be checked out.
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Json<PlansResponse> {
    let plans = state
        .plans
        .purchasable()
        .map(|(plan, _)| PlanEntry::from(plan))
        .collect();
    Json(PlansResponse { plans })
}

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Plan to subscribe to (default: `starter`).
    #[serde(default)]
    pub plan: Option<String>,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted checkout URL.
    pub url: String,
    /// Checkout session ID.
    pub session_id: String,
}

/// Start a subscription checkout.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let plan = match body.plan.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => raw
            .parse::<PlanId>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => PlanId::Starter,
    };

    let price_id = state
        .plans
        .price_id_for(plan)
        .ok_or_else(|| ApiError::BadRequest(format!("Plan {plan} is not available")))?
        .to_string();

    let billing = state.billing()?;
    let app_url = &state.config.app_url;
    let session = billing
        .create_checkout_session(&CheckoutRequest {
            price_id,
            user_id: auth.user_id.to_string(),
            email: auth.user.email.clone(),
            customer_id: auth.user.stripe_customer_id.clone(),
            success_url: format!("{app_url}/dashboard?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{app_url}/dashboard"),
        })
        .await?;

    let url = session
        .url
        .ok_or_else(|| ApiError::ExternalService("Checkout session has no URL".into()))?;

    tracing::info!(
        user_id = %auth.user_id,
        plan = %plan,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        url,
        session_id: session.id,
    }))
}

/// Sync-session request.
#[derive(Debug, Deserialize)]
pub struct SyncSessionBody {
    /// Checkout session ID from the success redirect.
    pub session_id: String,
}

/// Sync-session response.
#[derive(Debug, Serialize)]
pub struct SyncSessionResponse {
    /// Whether the subscription was written through.
    pub synced: bool,
    /// Why nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    /// Derived billing plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<String>,
}

impl From<SyncOutcome> for SyncSessionResponse {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Synced { billing_plan } => Self {
                synced: true,
                reason: None,
                billing_plan,
            },
            SyncOutcome::NotSynced { reason } => Self {
                synced: false,
                reason: Some(reason),
                billing_plan: None,
            },
        }
    }
}

/// Reconcile the subscription of a completed checkout without waiting for the webhook.
pub async fn sync_session(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SyncSessionBody>,
) -> Result<Json<SyncSessionResponse>, ApiError> {
    let session_id = body.session_id.trim();
    if session_id.is_empty() {
        return Err(ApiError::BadRequest("session_id required".into()));
    }

    let billing = state.billing()?;
    let mut user = auth.user;
    let outcome = sync_checkout_session(
        state.store.as_ref(),
        billing.as_ref(),
        &state.plans,
        &mut user,
        session_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// Portal response.
#[derive(Debug, Serialize)]
pub struct PortalResponse {
    /// Billing portal URL.
    pub url: String,
}

/// Open the billing portal.
pub async fn create_portal(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<PortalResponse>, ApiError> {
    let customer_id = auth
        .user
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("No billing account yet. Subscribe first.".into()))?;

    let billing = state.billing()?;
    let return_url = format!("{}/dashboard", state.config.app_url);
    let portal = billing.create_portal_session(customer_id, &return_url).await?;

    Ok(Json(PortalResponse { url: portal.url }))
}
