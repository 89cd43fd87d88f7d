//! Twilio API and webhook types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Purchased incoming number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingNumber {
    /// Incoming phone number SID.
    pub sid: String,
    /// E.164 number.
    pub phone_number: String,
}

/// `AvailablePhoneNumbers` search response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AvailableNumbers {
    #[serde(default)]
    pub available_phone_numbers: Vec<AvailableNumber>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailableNumber {
    pub phone_number: String,
}

/// Call resource, only the timing fields.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallResource {
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
}

impl CallResource {
    /// When the call started; Twilio formats dates as RFC 2822.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.date_created
            .as_deref()
            .or(self.start_time.as_deref())
            .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Twilio error body.
#[derive(Debug, Deserialize)]
pub(crate) struct TwilioErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Webhooks
// ============================================================================

/// Voice webhook form (incoming call).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceWebhook {
    /// Number that was called.
    #[serde(rename = "To", default)]
    pub to: Option<String>,
    /// Caller.
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    /// Call SID.
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
}

/// Media stream status callback form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamStatusWebhook {
    /// `stream-started`, `stream-stopped` or `stream-error`.
    #[serde(rename = "StreamEvent", default)]
    pub stream_event: Option<String>,
    /// Call SID.
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    /// Stream name; set to the receptionist ID when the stream is opened.
    #[serde(rename = "StreamName", default)]
    pub stream_name: Option<String>,
    /// ISO 8601 time of the event.
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<String>,
}

impl StreamStatusWebhook {
    /// Whether the stream ended.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stream_event.as_deref() == Some("stream-stopped")
    }

    /// Event time, if present and parseable.
    #[must_use]
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}
