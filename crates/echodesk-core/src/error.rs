//! Error types for EchoDesk domain rules.

use crate::ids::IdError;

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DeskError>;

/// Errors raised by domain validation and state checks.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// A required field was missing or blank.
    #[error("{field} is required")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field was present but malformed.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The tenant has no active subscription.
    #[error("active subscription required")]
    SubscriptionRequired,

    /// The tenant has not connected a calendar.
    #[error("calendar not connected")]
    CalendarNotConnected,

    /// Unknown configuration kind in a request path.
    #[error("unknown configuration kind: {0}")]
    UnknownConfigKind(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Malformed configuration payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl DeskError {
    /// Shorthand for [`DeskError::InvalidField`].
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
