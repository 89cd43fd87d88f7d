//! Receptionists and their settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};
use crate::{ReceptionistId, UserId};

/// Minimum number of digits accepted for a business phone number.
pub const MIN_PHONE_DIGITS: usize = 10;

/// An AI receptionist owned by one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receptionist {
    /// Receptionist ID.
    pub id: ReceptionistId,

    /// Owning tenant.
    pub user_id: UserId,

    /// Display name spoken to callers.
    pub name: String,

    /// The business phone number quoted to callers (E.164).
    pub phone_number: String,

    /// Number callers dial, assigned by the voice platform.
    pub inbound_phone_number: Option<String>,

    /// Calendar override. Falls back to the owner's default calendar.
    pub calendar_id: Option<String>,

    /// Voice platform assistant ID.
    pub vapi_assistant_id: Option<String>,

    /// Voice platform phone number ID.
    pub vapi_phone_number_id: Option<String>,

    /// Twilio incoming number SID (alternate telephony path).
    pub twilio_phone_number_sid: Option<String>,

    /// Twilio number in E.164 (alternate telephony path).
    pub twilio_phone_number: Option<String>,

    /// Whether inbound calls are answered.
    pub status: ReceptionistStatus,

    /// Free-text instructions appended to the prompt.
    pub extra_instructions: Option<String>,

    /// Source URL of the cached website text.
    pub website_url: Option<String>,

    /// Text extracted from the business website.
    pub website_content: Option<String>,

    /// When the website text was fetched.
    pub website_content_updated_at: Option<DateTime<Utc>>,

    /// Payment instructions for callers.
    pub payment_settings: Option<PaymentSettings>,

    /// SHA-256 of the prompt last pushed to the voice platform.
    pub applied_prompt_sha256: Option<String>,

    /// When the receptionist was created.
    pub created_at: DateTime<Utc>,

    /// When the receptionist was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Receptionist {
    /// Create a receptionist with no external resources attached.
    #[must_use]
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        phone_number: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReceptionistId::generate(),
            user_id,
            name: name.into(),
            phone_number: phone_number.into(),
            inbound_phone_number: None,
            calendar_id: None,
            vapi_assistant_id: None,
            vapi_phone_number_id: None,
            twilio_phone_number_sid: None,
            twilio_phone_number: None,
            status: ReceptionistStatus::Active,
            extra_instructions: None,
            website_url: None,
            website_content: None,
            website_content_updated_at: None,
            payment_settings: None,
            applied_prompt_sha256: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` owns this receptionist.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.user_id == *user_id
    }
}

/// Receptionist availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceptionistStatus {
    /// Answering calls.
    #[default]
    Active,
    /// Not answering calls.
    Paused,
}

impl ReceptionistStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }

    /// Parse the storage string form. Unknown values map to `Paused`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "active" {
            Self::Active
        } else {
            Self::Paused
        }
    }
}

/// How callers pay for bookings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// Whether a deposit secures a booking.
    pub accept_deposit: bool,
    /// Deposit amount in cents.
    pub deposit_amount_cents: i64,
    /// Accepted payment methods, e.g. `card`, `cash`.
    pub payment_methods: Vec<String>,
    /// Refund policy text.
    pub refund_policy: Option<String>,
}

impl PaymentSettings {
    /// Reject negative deposits and trim free-text fields.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::InvalidField`] when the deposit amount is negative.
    pub fn normalized(mut self) -> Result<Self> {
        if self.deposit_amount_cents < 0 {
            return Err(DeskError::invalid(
                "deposit_amount_cents",
                "must not be negative",
            ));
        }
        self.payment_methods = self
            .payment_methods
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        self.refund_policy = non_blank(self.refund_policy);
        Ok(self)
    }
}

/// Normalize a business phone number to E.164.
///
/// Ten digits are treated as a North American number and get a `+1` prefix.
/// Anything longer is prefixed with `+` as-is.
///
/// # Errors
///
/// Returns [`DeskError::InvalidField`] when fewer than ten digits remain after
/// stripping formatting characters.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return Err(DeskError::invalid(
            "phone_number",
            "a valid phone number is required",
        ));
    }
    if digits.len() == MIN_PHONE_DIGITS {
        Ok(format!("+1{digits}"))
    } else {
        Ok(format!("+{digits}"))
    }
}

/// Trim a required text field.
///
/// # Errors
///
/// Returns [`DeskError::MissingField`] when the value is blank.
pub fn required(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DeskError::MissingField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trim an optional text field, mapping blank to `None`.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_digit_numbers_get_country_code() {
        assert_eq!(normalize_phone("(555) 123-4567").unwrap(), "+15551234567");
    }

    #[test]
    fn longer_numbers_keep_their_prefix() {
        assert_eq!(normalize_phone("1 555 123 4567").unwrap(), "+15551234567");
        assert_eq!(normalize_phone("+44 20 7946 0958").unwrap(), "+442079460958");
    }

    #[test]
    fn short_numbers_are_rejected() {
        assert!(matches!(
            normalize_phone("555-1234"),
            Err(DeskError::InvalidField { field: "phone_number", .. })
        ));
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Ava ").unwrap(), "Ava");
        assert!(matches!(
            required("name", "   "),
            Err(DeskError::MissingField { field: "name" })
        ));
    }

    #[test]
    fn payment_settings_drop_blank_methods() {
        let settings = PaymentSettings {
            accept_deposit: true,
            deposit_amount_cents: 2000,
            payment_methods: vec![" card ".into(), String::new()],
            refund_policy: Some("   ".into()),
        }
        .normalized()
        .unwrap();
        assert_eq!(settings.payment_methods, vec!["card".to_string()]);
        assert!(settings.refund_policy.is_none());
    }

    #[test]
    fn negative_deposit_is_rejected() {
        let settings = PaymentSettings {
            deposit_amount_cents: -1,
            ..PaymentSettings::default()
        };
        assert!(settings.normalized().is_err());
    }

    #[test]
    fn payment_settings_tolerate_missing_fields() {
        let settings: PaymentSettings =
            serde_json::from_str(r#"{"payment_methods":["card"]}"#).unwrap();
        assert!(!settings.accept_deposit);
        assert_eq!(settings.deposit_amount_cents, 0);
    }
}
