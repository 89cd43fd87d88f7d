//! Prompt preview and apply.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use echodesk_core::{build_prompt, PromptInput};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::receptionists::parse_receptionist_id;
use crate::ownership::authorize_receptionist;
use crate::provisioning::{ApplyOutcome, Provisioner};
use crate::state::AppState;

/// Preview query.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Render the compact variant.
    #[serde(default)]
    pub compact: bool,
}

/// Preview response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// The rendered prompt.
    pub prompt: String,
    /// Length in characters.
    pub char_count: usize,
}

/// Render the prompt as it would be applied.
pub async fn preview_prompt(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let receptionist = authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let config = state.store.get_config(&id).await?;
    let prompt = build_prompt(&PromptInput::for_receptionist(
        &receptionist,
        &config,
        query.compact,
    ));

    Ok(Json(PreviewResponse {
        char_count: prompt.chars().count(),
        prompt,
    }))
}

/// Apply response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    /// Whether the assistant was updated.
    pub applied: bool,
    /// Length of the applied prompt, when it was pushed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
}

/// Push the current prompt to the voice assistant.
pub async fn apply_prompt(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let receptionist = authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let outcome = Provisioner::from_state(&state)
        .apply_prompt(&receptionist, Utc::now())
        .await?;

    Ok(Json(match outcome {
        ApplyOutcome::Applied { char_count } => ApplyResponse {
            applied: true,
            char_count: Some(char_count),
        },
        ApplyOutcome::Unchanged => ApplyResponse {
            applied: false,
            char_count: None,
        },
    }))
}
