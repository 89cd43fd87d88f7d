//! Vapi API types.

use serde::{Deserialize, Serialize};

/// LLM provider of every assistant.
pub const MODEL_PROVIDER: &str = "openai";

/// LLM of every assistant.
pub const MODEL: &str = "gpt-4o-mini";

/// TTS provider of every assistant.
pub const VOICE_PROVIDER: &str = "11labs";

/// TTS voice of every assistant.
pub const VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Tool that lists free calendar slots.
pub const AVAILABILITY_TOOL_TYPE: &str = "google.calendar.availability.check";

/// Tool that books a calendar event.
pub const CREATE_EVENT_TOOL_TYPE: &str = "google.calendar.event.create";

// ============================================================================
// Tools
// ============================================================================

/// Tool creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    /// Tool type.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name the model calls.
    pub name: String,
    /// When the model should call it.
    pub description: String,
    /// Calendar the tool operates on.
    pub calendar_id: String,
    /// IANA time zone.
    pub time_zone: String,
}

/// The availability and booking tools for one calendar.
#[must_use]
pub fn calendar_tools(calendar_id: &str, time_zone: &str) -> [ToolRequest; 2] {
    let calendar_id = calendar_id.trim().to_string();
    let time_zone = time_zone.trim().to_string();
    [
        ToolRequest {
            tool_type: AVAILABILITY_TOOL_TYPE.into(),
            name: "checkCalendarAvailability".into(),
            description: "Use this tool to check calendar availability before booking. Call it to see available slots.".into(),
            calendar_id: calendar_id.clone(),
            time_zone: time_zone.clone(),
        },
        ToolRequest {
            tool_type: CREATE_EVENT_TOOL_TYPE.into(),
            name: "createCalendarEvent".into(),
            description: "Use this tool to schedule appointments and create calendar events. Use after checking availability.".into(),
            calendar_id,
            time_zone,
        },
    ]
}

/// Tool object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tool {
    /// Tool ID.
    pub id: String,
    /// Tool type.
    #[serde(rename = "type", default)]
    pub tool_type: String,
}

// ============================================================================
// Assistants
// ============================================================================

/// Chat message in the model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Role (`system`).
    pub role: String,
    /// Text.
    pub content: String,
}

/// Model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// LLM provider.
    pub provider: String,
    /// LLM name.
    pub model: String,
    /// System prompt as a single system message.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_ids: Vec<String>,
}

impl ModelConfig {
    /// Model configuration carrying `prompt` as the system message.
    #[must_use]
    pub fn with_prompt(prompt: &str, tool_ids: Vec<String>) -> Self {
        Self {
            provider: MODEL_PROVIDER.into(),
            model: MODEL.into(),
            messages: vec![Message {
                role: "system".into(),
                content: prompt.to_string(),
            }],
            tool_ids,
        }
    }
}

/// Voice configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// TTS provider.
    pub provider: String,
    /// Voice ID.
    pub voice_id: String,
}

/// Server callback configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// Webhook URL.
    pub url: String,
    /// Sent back as `x-vapi-secret`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Assistant creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    /// Display name.
    pub name: String,
    /// Model configuration.
    pub model: ModelConfig,
    /// Voice configuration.
    pub voice: VoiceConfig,
    /// Greeting.
    pub first_message: String,
    /// Webhook target.
    pub server: ServerConfig,
}

impl AssistantRequest {
    /// Assistant for a receptionist named `name`.
    #[must_use]
    pub fn receptionist(
        name: &str,
        prompt: &str,
        tool_ids: Vec<String>,
        server_url: String,
        server_secret: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            model: ModelConfig::with_prompt(prompt, tool_ids),
            voice: VoiceConfig {
                provider: VOICE_PROVIDER.into(),
                voice_id: VOICE_ID.into(),
            },
            first_message: greeting(name),
            server: ServerConfig {
                url: server_url,
                secret: server_secret,
            },
        }
    }
}

/// Opening line of every call.
#[must_use]
pub fn greeting(name: &str) -> String {
    format!("Hello! Thanks for calling. I'm {name}, your AI receptionist. How can I help you today?")
}

/// Assistant update carrying a new system prompt.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantPromptUpdate {
    /// Model configuration.
    pub model: ModelConfig,
}

/// Assistant object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Assistant {
    /// Assistant ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

// ============================================================================
// Phone numbers
// ============================================================================

/// Free phone number request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberRequest {
    /// Always `vapi`.
    pub provider: String,
    /// Preferred US area code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_code: Option<String>,
}

/// Attach request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberAttach {
    /// Assistant answering the number.
    pub assistant_id: String,
}

/// Phone number object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    /// Phone number ID.
    pub id: String,
    /// E.164 number, once provisioned.
    #[serde(default)]
    pub number: Option<String>,
    /// Provisioning status (`activating`, `active`, `blocked`).
    #[serde(default)]
    pub status: Option<String>,
    /// Assistant answering the number.
    #[serde(default)]
    pub assistant_id: Option<String>,
}

impl PhoneNumber {
    /// Whether the number can take calls.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => status == "active",
            None => self.number.is_some(),
        }
    }
}

// ============================================================================
// Webhooks
// ============================================================================

/// Webhook body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    /// The message, absent on pings.
    #[serde(default)]
    pub message: Option<WebhookMessage>,
}

/// Webhook message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    /// Message type.
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Call status for `status-update`.
    #[serde(default)]
    pub status: Option<String>,
    /// The call.
    #[serde(default)]
    pub call: Option<CallInfo>,
    /// Recording artifacts.
    #[serde(default)]
    pub artifact: Option<Artifact>,
}

impl WebhookMessage {
    /// `end-of-call-report`, or `status-update` with status `ended`.
    #[must_use]
    pub fn is_end_of_call(&self) -> bool {
        self.message_type == "end-of-call-report"
            || (self.message_type == "status-update" && self.status.as_deref() == Some("ended"))
    }
}

/// Call details in a webhook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInfo {
    /// Call ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Assistant that took the call.
    #[serde(default, alias = "assistant_id")]
    pub assistant_id: Option<String>,
    /// Number that was called.
    #[serde(default, alias = "phone_number_id")]
    pub phone_number_id: Option<String>,
    /// RFC 3339 start time.
    #[serde(default)]
    pub started_at: Option<String>,
    /// RFC 3339 end time.
    #[serde(default)]
    pub ended_at: Option<String>,
}

/// End-of-call artifacts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artifact {
    /// Plain-text transcript.
    #[serde(default)]
    pub transcript: Option<String>,
}
