//! Voice server endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use echodesk_core::{build_prompt, PromptInput};

use crate::auth::VoiceServerAuth;
use crate::error::ApiError;
use crate::handlers::receptionists::parse_receptionist_id;
use crate::state::AppState;

/// Prompt query.
#[derive(Debug, Deserialize)]
pub struct VoicePromptQuery {
    /// Receptionist answering the call.
    #[serde(default)]
    pub receptionist_id: Option<String>,
}

/// Prompt response.
#[derive(Debug, Serialize)]
pub struct VoicePromptResponse {
    /// Compact system prompt.
    pub prompt: String,
    /// Receptionist name, for the greeting.
    pub name: String,
}

/// Compact prompt for a self-hosted voice session.
pub async fn get_voice_prompt(
    State(state): State<Arc<AppState>>,
    _auth: VoiceServerAuth,
    Query(query): Query<VoicePromptQuery>,
) -> Result<Json<VoicePromptResponse>, ApiError> {
    let raw = query
        .receptionist_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("receptionist_id required".into()))?;
    let id = parse_receptionist_id(raw)?;

    let receptionist = state
        .store
        .get_receptionist(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Receptionist not found".into()))?;
    let config = state.store.get_config(&id).await?;
    let prompt = build_prompt(&PromptInput::for_receptionist(&receptionist, &config, true));

    Ok(Json(VoicePromptResponse {
        prompt,
        name: receptionist.name,
    }))
}
