//! Webhook handlers for Stripe, Vapi and Twilio.
//!
//! Once a payload is understood the answer is a 2xx, even when there is
//! nothing to do. Persistence failures surface as 5xx so the sender retries.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;

use echodesk_core::{CallUsageEvent, ReceptionistId};

use crate::billing::{handle_event, EventOutcome};
use crate::crypto::{constant_time_eq, verify_stripe_signature, verify_twilio_signature};
use crate::error::ApiError;
use crate::handlers::WebhookResponse;
use crate::state::AppState;
use crate::stripe::WebhookEvent;
use crate::twilio::{twiml, StreamStatusWebhook, VoiceWebhook};
use crate::usage::{RecordOutcome, UsageAggregator};
use crate::vapi::WebhookEnvelope;

/// Header carrying the Vapi shared secret.
pub const VAPI_SECRET_HEADER: &str = "x-vapi-secret";

/// Header carrying the Twilio request signature.
pub const TWILIO_SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Assumed call length when Twilio cannot tell us when the call started.
const DEFAULT_STREAM_CALL_SECONDS: i64 = 60;

const TWILIO_VOICE_PATH: &str = "/webhooks/twilio/voice";
const TWILIO_STATUS_PATH: &str = "/webhooks/twilio/status";

// ============================================================================
// Stripe
// ============================================================================

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
        tracing::warn!("Stripe webhook received but no signing secret is configured");
        ApiError::BadRequest("Webhook signing secret not configured".into())
    })?;
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    verify_stripe_signature(secret, &body, signature, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Invalid Stripe webhook signature");
        ApiError::BadRequest("Invalid webhook signature".into())
    })?;

    let event: WebhookEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    let outcome = handle_event(
        state.store.as_ref(),
        state.billing.as_deref(),
        &state.plans,
        &event,
        Utc::now(),
    )
    .await?;

    match outcome {
        EventOutcome::Applied { user_id, changed } => {
            tracing::info!(event_id = %event.id, user_id = %user_id, changed, "Stripe event applied");
        }
        EventOutcome::Ignored(reason) => {
            tracing::debug!(event_id = %event.id, reason, "Stripe event ignored");
        }
    }

    Ok(Json(WebhookResponse::received()))
}

// ============================================================================
// Vapi
// ============================================================================

fn parse_rfc3339(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Handle Vapi server messages. Only end-of-call messages are acted on.
pub async fn vapi_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(expected) = &state.config.vapi_webhook_secret {
        let provided = headers
            .get(VAPI_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq(provided, expected) {
            tracing::warn!("Vapi webhook with invalid secret");
            return Err(ApiError::Unauthorized);
        }
    } else {
        tracing::warn!("Vapi webhook secret not configured - skipping verification");
    }

    let envelope: WebhookEnvelope =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let Some(message) = envelope.message.filter(|m| m.is_end_of_call()) else {
        return Ok(Json(WebhookResponse::received()));
    };
    let Some(call) = message.call else {
        return Ok(Json(WebhookResponse::received()));
    };
    let Some(call_id) = call.id.clone().filter(|id| !id.is_empty()) else {
        tracing::warn!(message_type = %message.message_type, "End-of-call message without call id");
        return Ok(Json(WebhookResponse::received()));
    };

    let mut receptionist = None;
    if let Some(assistant_id) = &call.assistant_id {
        receptionist = state.store.find_receptionist_by_assistant(assistant_id).await?;
    }
    if receptionist.is_none() {
        if let Some(phone_number_id) = &call.phone_number_id {
            receptionist = state
                .store
                .find_receptionist_by_vapi_phone(phone_number_id)
                .await?;
        }
    }
    let Some(receptionist) = receptionist else {
        tracing::debug!(call_id = %call_id, "No receptionist for call");
        return Ok(Json(WebhookResponse::received()));
    };

    let event = CallUsageEvent::from_timestamps(
        receptionist.id,
        call_id,
        parse_rfc3339(call.started_at.as_deref()),
        parse_rfc3339(call.ended_at.as_deref()),
        message.artifact.and_then(|a| a.transcript),
        Utc::now(),
    );
    record(&state, &event).await?;

    Ok(Json(WebhookResponse::received()))
}

async fn record(state: &AppState, event: &CallUsageEvent) -> Result<RecordOutcome, ApiError> {
    UsageAggregator::new(Arc::clone(&state.store))
        .record_call(event)
        .await
        .map_err(|e| {
            tracing::error!(
                external_call_id = %event.external_call_id,
                error = %e,
                "Failed to record call usage"
            );
            ApiError::Internal(e.to_string())
        })
}

// ============================================================================
// Twilio
// ============================================================================

/// Build a typed form from raw fields.
fn typed_form<T: DeserializeOwned>(params: &[(String, String)]) -> Result<T, ApiError> {
    let map: serde_json::Map<String, serde_json::Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::from_value(serde_json::Value::Object(map))
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Check `X-Twilio-Signature` when an auth token is configured.
fn verify_twilio(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    params: &[(String, String)],
) -> Result<(), ApiError> {
    let Some(token) = state.config.twilio_auth_token.as_deref() else {
        tracing::warn!("Twilio auth token not configured - skipping signature verification");
        return Ok(());
    };

    let signature = headers
        .get(TWILIO_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Forbidden)?;

    let base = state
        .config
        .twilio_webhook_base_url
        .as_deref()
        .unwrap_or(&state.config.public_url);
    let url = format!("{base}{path}");

    if verify_twilio_signature(token, &url, params, signature) {
        Ok(())
    } else {
        tracing::warn!(url = %url, "Invalid Twilio signature");
        Err(ApiError::Forbidden)
    }
}

fn twiml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Answer an incoming call on a self-provisioned number.
pub async fn twilio_voice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    verify_twilio(&state, &headers, TWILIO_VOICE_PATH, &params)?;
    let call: VoiceWebhook = typed_form(&params)?;

    let Some(to) = call.to.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(twiml_response(twiml::say_and_hangup(
            twiml::NOT_CONFIGURED_MESSAGE,
        )));
    };

    let receptionist = match state.store.find_active_receptionist_by_number(to).await {
        Ok(Some(receptionist)) => receptionist,
        Ok(None) => {
            tracing::info!(to = %to, "Call to a number without an active receptionist");
            return Ok(twiml_response(twiml::say_and_hangup(
                twiml::NOT_CONFIGURED_MESSAGE,
            )));
        }
        Err(e) => {
            tracing::error!(to = %to, error = %e, "Receptionist lookup failed");
            return Ok(twiml_response(twiml::say_and_hangup(
                twiml::UNAVAILABLE_MESSAGE,
            )));
        }
    };

    let Some(ws_url) = state.config.voice_server_ws_url.as_deref() else {
        tracing::error!("VOICE_SERVER_WS_URL not configured");
        return Ok(twiml_response(twiml::say_and_hangup(
            twiml::UNAVAILABLE_MESSAGE,
        )));
    };

    tracing::info!(
        receptionist_id = %receptionist.id,
        call_sid = call.call_sid.as_deref().unwrap_or_default(),
        "Connecting call to voice server"
    );

    Ok(twiml_response(twiml::connect_stream(
        ws_url,
        &receptionist.id.to_string(),
        state.config.twilio_status_url().as_deref(),
    )))
}

/// Record usage when a media stream stops.
pub async fn twilio_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Result<Json<WebhookResponse>, ApiError> {
    verify_twilio(&state, &headers, TWILIO_STATUS_PATH, &params)?;
    let status: StreamStatusWebhook = typed_form(&params)?;

    if !status.is_stopped() {
        return Ok(Json(WebhookResponse::received()));
    }
    let (Some(call_sid), Some(receptionist_id)) = (
        status.call_sid.as_deref().filter(|s| !s.is_empty()),
        status
            .stream_name
            .as_deref()
            .and_then(|name| name.parse::<ReceptionistId>().ok()),
    ) else {
        return Ok(Json(WebhookResponse::received()));
    };

    if state.store.get_receptionist(&receptionist_id).await?.is_none() {
        tracing::debug!(receptionist_id = %receptionist_id, "Stream for unknown receptionist");
        return Ok(Json(WebhookResponse::received()));
    }

    let now = Utc::now();
    let ended_at = status.event_time().unwrap_or(now);
    let started_at = match &state.telephony {
        Some(telephony) => match telephony.fetch_call_started_at(call_sid).await {
            Ok(Some(started)) => Some(started),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, error = %e, "Could not fetch call start");
                None
            }
        },
        None => None,
    }
    .unwrap_or_else(|| ended_at - Duration::seconds(DEFAULT_STREAM_CALL_SECONDS));

    let event = CallUsageEvent::from_timestamps(
        receptionist_id,
        call_sid,
        Some(started_at),
        Some(ended_at),
        None,
        now,
    );
    record(&state, &event).await?;

    Ok(Json(WebhookResponse::received()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_form_reads_twilio_field_names() {
        let params = vec![
            ("To".to_string(), "+15550001111".to_string()),
            ("CallSid".to_string(), "CA123".to_string()),
        ];
        let call: VoiceWebhook = typed_form(&params).unwrap();
        assert_eq!(call.to.as_deref(), Some("+15550001111"));
        assert_eq!(call.call_sid.as_deref(), Some("CA123"));
        assert!(call.from.is_none());
    }

    #[test]
    fn rfc3339_parsing_tolerates_garbage() {
        assert!(parse_rfc3339(Some("2026-03-01T10:00:00Z")).is_some());
        assert!(parse_rfc3339(Some("yesterday")).is_none());
        assert!(parse_rfc3339(None).is_none());
    }
}
