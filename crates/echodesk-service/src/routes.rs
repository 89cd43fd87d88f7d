//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    billing, calendar, config_entries, cron, health, me, prompt, receptionists, usage, voice,
    webhooks,
};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /oauth/google/callback` - Google OAuth redirect target (signed state)
///
/// ## User (Bearer JWT)
/// - `GET /v1/me`, `PUT /v1/me/phone`
/// - `GET /v1/billing/plans`, `POST /v1/billing/checkout`,
///   `POST /v1/billing/sync-session`, `POST /v1/billing/portal`
/// - `GET /v1/calendar/connect`
/// - `GET|POST /v1/receptionists`, `GET|DELETE /v1/receptionists/:id`
/// - `PUT /v1/receptionists/:id/payment-settings`
/// - `PUT /v1/receptionists/:id/extra-instructions`
/// - `POST /v1/receptionists/:id/website`
/// - `GET|POST /v1/receptionists/:id/config/:kind`
/// - `PUT|DELETE /v1/receptionists/:id/config/:kind/:entry_id`
/// - `GET /v1/receptionists/:id/prompt`, `POST /v1/receptionists/:id/prompt/apply`
/// - `GET /v1/receptionists/:id/usage`
/// - `POST /v1/receptionists/:id/twilio-number`
///
/// ## Machine
/// - `GET /v1/voice/prompt` - `x-voice-server-key`
/// - `GET /cron/usage`, `GET /cron/billing` - `CRON_SECRET`
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe`
/// - `POST /webhooks/vapi`
/// - `POST /webhooks/twilio/voice`, `POST /webhooks/twilio/status`
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let receptionist_routes = Router::new()
        .route(
            "/",
            get(receptionists::list_receptionists).post(receptionists::create_receptionist),
        )
        .route(
            "/:id",
            get(receptionists::get_receptionist).delete(receptionists::delete_receptionist),
        )
        .route(
            "/:id/payment-settings",
            put(receptionists::update_payment_settings),
        )
        .route(
            "/:id/extra-instructions",
            put(receptionists::update_extra_instructions),
        )
        .route("/:id/website", post(receptionists::import_website))
        .route(
            "/:id/config/:kind",
            get(config_entries::list_entries).post(config_entries::create_entry),
        )
        .route(
            "/:id/config/:kind/:entry_id",
            put(config_entries::update_entry).delete(config_entries::delete_entry),
        )
        .route("/:id/prompt", get(prompt::preview_prompt))
        .route("/:id/prompt/apply", post(prompt::apply_prompt))
        .route("/:id/usage", get(usage::get_usage))
        .route(
            "/:id/twilio-number",
            post(receptionists::provision_twilio_number),
        );

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        .route("/me", get(me::get_me))
        .route("/me/phone", put(me::update_phone))
        .route("/billing/plans", get(billing::list_plans))
        .route("/billing/checkout", post(billing::create_checkout))
        .route("/billing/sync-session", post(billing::sync_session))
        .route("/billing/portal", post(billing::create_portal))
        .route("/calendar/connect", get(calendar::connect))
        .route("/voice/prompt", get(voice::get_voice_prompt))
        .nest("/receptionists", receptionist_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Scheduler
        .route("/cron/usage", get(cron::run_usage))
        .route("/cron/billing", get(cron::run_billing))
        // OAuth redirect
        .route("/oauth/google/callback", get(calendar::google_callback))
        // Webhooks (no rate limit - controlled by external services)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/webhooks/vapi", post(webhooks::vapi_webhook))
        .route("/webhooks/twilio/voice", post(webhooks::twilio_voice))
        .route("/webhooks/twilio/status", post(webhooks::twilio_status))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
