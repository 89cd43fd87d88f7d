//! Receptionist ownership guard.
//!
//! Every read or mutation of a receptionist, or of anything hanging off one,
//! goes through [`authorize_receptionist`] first.

use echodesk_core::{Receptionist, ReceptionistId, UserId};
use echodesk_store::Store;

use crate::error::ApiError;

/// Load a receptionist on behalf of `actor`.
///
/// # Errors
///
/// `NotFound` when the receptionist does not exist, `Forbidden` when another
/// user owns it, `Internal` on storage failure.
pub async fn authorize_receptionist(
    store: &dyn Store,
    actor: &UserId,
    receptionist_id: &ReceptionistId,
) -> Result<Receptionist, ApiError> {
    let receptionist = store
        .get_receptionist(receptionist_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Receptionist not found".into()))?;

    if !receptionist.is_owned_by(actor) {
        tracing::warn!(
            receptionist_id = %receptionist_id,
            actor = %actor,
            "Receptionist access denied"
        );
        return Err(ApiError::Forbidden);
    }

    Ok(receptionist)
}
