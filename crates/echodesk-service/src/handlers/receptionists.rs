//! Receptionist handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use echodesk_core::receptionist::non_blank;
use echodesk_core::{DeskError, PaymentSettings, Receptionist, ReceptionistId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::ownership::authorize_receptionist;
use crate::provisioning::{ProvisionRequest, Provisioner};
use crate::state::AppState;
use crate::website::{fetch_website_text, parse_url};

/// Parse a receptionist ID from a path segment.
pub(crate) fn parse_receptionist_id(raw: &str) -> Result<ReceptionistId, ApiError> {
    raw.parse::<ReceptionistId>()
        .map_err(|e| DeskError::from(e).into())
}

/// List response.
#[derive(Debug, Serialize)]
pub struct ReceptionistList {
    /// The user's receptionists, newest first.
    pub receptionists: Vec<Receptionist>,
}

/// List the current user's receptionists.
pub async fn list_receptionists(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ReceptionistList>, ApiError> {
    let receptionists = state.store.list_receptionists(&auth.user_id).await?;
    Ok(Json(ReceptionistList { receptionists }))
}

/// Create request.
#[derive(Debug, Deserialize)]
pub struct CreateReceptionistRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Business phone, any common format.
    #[serde(default)]
    pub phone_number: String,
    /// Calendar override.
    #[serde(default)]
    pub calendar_id: Option<String>,
    /// Preferred area code of the inbound number.
    #[serde(default)]
    pub area_code: Option<String>,
    /// Wait until the inbound number is live (default: true).
    #[serde(default = "default_wait")]
    pub wait_for_number: bool,
}

const fn default_wait() -> bool {
    true
}

/// Provision a receptionist.
pub async fn create_receptionist(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateReceptionistRequest>,
) -> Result<(StatusCode, Json<Receptionist>), ApiError> {
    let request = ProvisionRequest {
        name: body.name,
        phone_number: body.phone_number,
        calendar_id: body.calendar_id,
        area_code: body.area_code,
        wait_for_number: body.wait_for_number,
    };

    let receptionist = Provisioner::from_state(&state)
        .provision(&auth.user_id, &request, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(receptionist)))
}

/// Get one receptionist.
pub async fn get_receptionist(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Receptionist>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let receptionist = authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;
    Ok(Json(receptionist))
}

/// Delete a receptionist and its remote resources.
pub async fn delete_receptionist(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let receptionist = authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    Provisioner::from_state(&state)
        .decommission(&receptionist)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replace the payment settings.
pub async fn update_payment_settings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<PaymentSettings>,
) -> Result<Json<Receptionist>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let mut receptionist =
        authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    receptionist.payment_settings = Some(body.normalized()?);
    receptionist.updated_at = Utc::now();
    state.store.update_receptionist(&receptionist).await?;

    Ok(Json(receptionist))
}

/// Extra instructions request.
#[derive(Debug, Deserialize)]
pub struct ExtraInstructionsRequest {
    /// Free text; blank clears it.
    #[serde(default)]
    pub extra_instructions: Option<String>,
}

/// Replace the extra instructions.
pub async fn update_extra_instructions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<ExtraInstructionsRequest>,
) -> Result<Json<Receptionist>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let mut receptionist =
        authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    receptionist.extra_instructions = non_blank(body.extra_instructions);
    receptionist.updated_at = Utc::now();
    state.store.update_receptionist(&receptionist).await?;

    Ok(Json(receptionist))
}

/// Website import request.
#[derive(Debug, Deserialize)]
pub struct WebsiteRequest {
    /// Page to import.
    #[serde(default)]
    pub url: String,
}

/// Website import response.
#[derive(Debug, Serialize)]
pub struct WebsiteResponse {
    /// Imported URL.
    pub website_url: String,
    /// Characters kept.
    pub char_count: usize,
    /// When the page was fetched.
    pub updated_at: String,
}

/// Fetch the business website and cache its text on the receptionist.
pub async fn import_website(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<WebsiteRequest>,
) -> Result<Json<WebsiteResponse>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let mut receptionist =
        authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let url = parse_url(&body.url)?;
    let text = fetch_website_text(&state.http, &url).await?;
    let char_count = text.chars().count();
    let now = Utc::now();

    receptionist.website_url = Some(url.to_string());
    receptionist.website_content = Some(text);
    receptionist.website_content_updated_at = Some(now);
    receptionist.updated_at = now;
    state.store.update_receptionist(&receptionist).await?;

    tracing::info!(receptionist_id = %id, url = %url, chars = char_count, "Website imported");

    Ok(Json(WebsiteResponse {
        website_url: url.to_string(),
        char_count,
        updated_at: now.to_rfc3339(),
    }))
}

/// Twilio number request.
#[derive(Debug, Deserialize)]
pub struct TwilioNumberRequest {
    /// Three-digit US area code.
    #[serde(default)]
    pub area_code: String,
}

/// Buy a Twilio number that answers through the voice server.
pub async fn provision_twilio_number(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<TwilioNumberRequest>,
) -> Result<Json<Receptionist>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let receptionist = authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let updated = Provisioner::from_state(&state)
        .provision_twilio_number(&receptionist, &body.area_code, Utc::now())
        .await?;

    Ok(Json(updated))
}
