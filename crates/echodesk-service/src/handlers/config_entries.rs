//! Business configuration rows: staff, services, locations, promos and rules.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use echodesk_core::{ConfigEntry, ConfigKind, DeskError, EntryId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::receptionists::parse_receptionist_id;
use crate::ownership::authorize_receptionist;
use crate::state::AppState;

/// Rows of one kind.
#[derive(Debug, Serialize)]
pub struct EntryList {
    /// The kind listed.
    pub kind: ConfigKind,
    /// Rows in display order.
    pub items: Vec<ConfigEntry>,
}

fn parse_entry_id(raw: &str) -> Result<EntryId, ApiError> {
    raw.parse::<EntryId>()
        .map_err(|e| DeskError::from(e).into())
}

/// List the rows of one kind.
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<EntryList>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let kind: ConfigKind = kind.parse()?;
    authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let config = state.store.get_config(&id).await?;
    Ok(Json(EntryList {
        kind,
        items: config.entries(kind),
    }))
}

/// Add a row.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, kind)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<ConfigEntry>), ApiError> {
    let id = parse_receptionist_id(&id)?;
    let kind: ConfigKind = kind.parse()?;
    authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let entry = ConfigEntry::from_input(kind, EntryId::generate(), id, body, Utc::now())?;
    state.store.put_config_entry(&entry).await?;

    tracing::info!(receptionist_id = %id, kind = %kind, entry_id = %entry.id(), "Config entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Replace a row.
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, kind, entry_id)): Path<(String, String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ConfigEntry>, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let kind: ConfigKind = kind.parse()?;
    let entry_id = parse_entry_id(&entry_id)?;
    authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    let existing = state
        .store
        .get_config_entry(&id, kind, &entry_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{kind} entry not found")))?;

    let entry = ConfigEntry::from_input(kind, entry_id, id, body, existing.created_at())?;
    state.store.put_config_entry(&entry).await?;

    Ok(Json(entry))
}

/// Delete a row.
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, kind, entry_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let id = parse_receptionist_id(&id)?;
    let kind: ConfigKind = kind.parse()?;
    let entry_id = parse_entry_id(&entry_id)?;
    authorize_receptionist(state.store.as_ref(), &auth.user_id, &id).await?;

    state.store.delete_config_entry(&id, kind, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
