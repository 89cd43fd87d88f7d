//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use echodesk_core::DeskError;
use echodesk_store::StoreError;

use crate::google::GoogleError;
use crate::stripe::StripeError;
use crate::twilio::TwilioError;
use crate::vapi::VapiError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but the resource belongs to someone else.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The account needs an active subscription (or a connected calendar).
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// Duplicate event (idempotency).
    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::DuplicateEvent(_) => StatusCode::CONFLICT,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details) = match &self {
            Self::Unauthorized => ("unauthorized", self.to_string(), None),
            Self::Forbidden => ("forbidden", self.to_string(), None),
            Self::NotFound(msg) => ("not_found", msg.clone(), None),
            Self::BadRequest(msg) => ("bad_request", msg.clone(), None),
            Self::Conflict(msg) => ("conflict", msg.clone(), None),
            Self::PaymentRequired(msg) => ("payment_required", msg.clone(), None),
            Self::DuplicateEvent(id) => (
                "duplicate_event",
                format!("Event {id} already processed"),
                Some(serde_json::json!({ "event_id": id })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                ("internal_error", "An internal error occurred".to_string(), None)
            }
            Self::ExternalService(msg) => ("external_service_error", msg.clone(), None),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::DuplicateEvent { event_id } => Self::DuplicateEvent(event_id),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::SubscriptionRequired => {
                Self::PaymentRequired("Active subscription required.".into())
            }
            DeskError::CalendarNotConnected => Self::PaymentRequired(
                "Connect Google Calendar before creating a receptionist.".into(),
            ),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        tracing::warn!(error = %err, "Stripe request failed");
        Self::ExternalService(format!("Billing provider error: {err}"))
    }
}

impl From<VapiError> for ApiError {
    fn from(err: VapiError) -> Self {
        tracing::warn!(error = %err, "Vapi request failed");
        Self::ExternalService(format!("Voice platform error: {err}"))
    }
}

impl From<TwilioError> for ApiError {
    fn from(err: TwilioError) -> Self {
        tracing::warn!(error = %err, "Twilio request failed");
        Self::ExternalService(format!("Telephony provider error: {err}"))
    }
}

impl From<GoogleError> for ApiError {
    fn from(err: GoogleError) -> Self {
        tracing::warn!(error = %err, "Google request failed");
        Self::ExternalService(format!("Calendar provider error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let not_found: ApiError = StoreError::NotFound {
            entity: "receptionist",
            id: "abc".into(),
        }
        .into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict: ApiError = StoreError::Conflict("taken".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let db: ApiError = StoreError::Database("down".into()).into();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let missing: ApiError = DeskError::MissingField { field: "name" }.into();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unpaid: ApiError = DeskError::SubscriptionRequired.into();
        assert_eq!(unpaid.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn platform_errors_are_bad_gateway() {
        let err: ApiError = VapiError::Configuration("no key".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
