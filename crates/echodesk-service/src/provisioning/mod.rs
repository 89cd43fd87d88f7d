//! Receptionist provisioning.
//!
//! Creating a receptionist touches the voice platform three times (calendar
//! tools, assistant, phone number) before the row is written. Each completed
//! remote step registers an undo on a [`Saga`], so a failure part-way leaves
//! nothing billable behind.

pub mod saga;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;

use echodesk_core::receptionist::{non_blank, required};
use echodesk_core::{
    build_prompt, normalize_phone, DeskError, PromptInput, Receptionist, ReceptionistStatus,
    UserId,
};
use echodesk_store::{Store, StoreError};

pub use saga::Saga;

use crate::config::ServiceConfig;
use crate::crypto::sha256_hex;
use crate::error::ApiError;
use crate::platform::{TelephonyPlatform, VoicePlatform};
use crate::state::AppState;
use crate::twilio::TwilioError;
use crate::vapi::{calendar_tools, AssistantRequest, VapiError};

/// Shown when the calendar tools cannot be created.
pub const CALENDAR_TOOLS_MESSAGE: &str = "Could not create calendar tools. Connect Google Calendar in Vapi Dashboard (Integrations → Tools → Google Calendar), then try again.";

/// Shown when the voice platform's free-number allowance is used up.
pub const PHONE_LIMIT_MESSAGE: &str = "Phone number limit reached (10 free numbers per account). Please contact support to add more numbers.";

/// Shown for any other provisioning failure.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Could not activate your AI receptionist. Please try again or contact support.";

/// Shown when a prompt is applied to a receptionist without an assistant.
pub const NO_ASSISTANT_MESSAGE: &str = "This receptionist has no Vapi assistant linked. Create it from the receptionists list first.";

/// Polls of a freshly created number before giving up on readiness.
const DEFAULT_POLL_ATTEMPTS: u32 = 10;

/// Delay between readiness polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Provisioning errors.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Input or account state rejected before any remote call.
    #[error(transparent)]
    Rejected(#[from] DeskError),

    /// The calendar tools could not be created.
    #[error("calendar tool creation failed: {0}")]
    CalendarTools(#[source] VapiError),

    /// The voice platform refused another free number.
    #[error("phone number limit reached: {0}")]
    PhoneLimit(#[source] VapiError),

    /// Any other voice platform failure during provisioning.
    #[error("voice platform step {step} failed: {source}")]
    Voice {
        /// Step that failed.
        step: &'static str,
        /// Underlying error.
        source: VapiError,
    },

    /// Telephony platform failure.
    #[error("telephony error: {0}")]
    Telephony(#[from] TwilioError),

    /// No number available in the requested area code.
    #[error("no number available in area code {0}")]
    NoNumberAvailable(String),

    /// The receptionist has no assistant to update.
    #[error("receptionist has no assistant")]
    NoAssistant,

    /// The receptionist already holds a self-provisioned number.
    #[error("receptionist already has a Twilio number")]
    AlreadyHasNumber,

    /// Missing service configuration.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// Storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Rejected(e) => e.into(),
            ProvisionError::CalendarTools(e) => {
                tracing::warn!(error = %e, "Calendar tool creation failed");
                Self::ExternalService(CALENDAR_TOOLS_MESSAGE.into())
            }
            ProvisionError::PhoneLimit(e) => {
                tracing::warn!(error = %e, "Phone number limit reached");
                Self::ExternalService(PHONE_LIMIT_MESSAGE.into())
            }
            ProvisionError::Voice { step, source } => {
                tracing::warn!(step, error = %source, "Provisioning step failed");
                Self::ExternalService(GENERIC_FAILURE_MESSAGE.into())
            }
            ProvisionError::Telephony(e) => e.into(),
            ProvisionError::NoNumberAvailable(area) => Self::BadRequest(format!(
                "No available phone numbers in area code {area}. Try a different area code."
            )),
            ProvisionError::NoAssistant => Self::BadRequest(NO_ASSISTANT_MESSAGE.into()),
            ProvisionError::AlreadyHasNumber => {
                Self::Conflict("Receptionist already has a Twilio number.".into())
            }
            ProvisionError::NotConfigured(what) => Self::ExternalService(what.into()),
            ProvisionError::Store(e) => e.into(),
        }
    }
}

/// Input of [`Provisioner::provision`].
#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    /// Receptionist display name.
    pub name: String,
    /// Business phone for transfers.
    pub phone_number: String,
    /// Calendar to book into; defaults to the user's connected calendar.
    pub calendar_id: Option<String>,
    /// Preferred area code for the inbound number.
    pub area_code: Option<String>,
    /// Poll until the inbound number is live before returning.
    pub wait_for_number: bool,
}

/// Outcome of applying a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The assistant was updated.
    Applied {
        /// Prompt length in characters.
        char_count: usize,
    },
    /// The assistant already runs this prompt.
    Unchanged,
}

/// Values taken from configuration.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Assistant webhook URL.
    pub server_url: String,
    /// Assistant webhook secret.
    pub server_secret: Option<String>,
    /// Time zone of the calendar tools.
    pub time_zone: String,
    /// Voice URL of self-provisioned numbers.
    pub twilio_voice_url: Option<String>,
    /// Readiness polls of a new number.
    pub poll_attempts: u32,
    /// Delay between polls.
    pub poll_interval: Duration,
}

impl ProvisionSettings {
    /// Settings derived from the service configuration.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            server_url: config.vapi_webhook_url(),
            server_secret: config.vapi_webhook_secret.clone(),
            time_zone: config.vapi_calendar_timezone.clone(),
            twilio_voice_url: config.twilio_voice_url(),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Creates, updates and tears down receptionists.
#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn Store>,
    voice: Option<Arc<dyn VoicePlatform>>,
    telephony: Option<Arc<dyn TelephonyPlatform>>,
    settings: ProvisionSettings,
}

impl Provisioner {
    /// Create a provisioner.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        voice: Option<Arc<dyn VoicePlatform>>,
        telephony: Option<Arc<dyn TelephonyPlatform>>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            store,
            voice,
            telephony,
            settings,
        }
    }

    /// Provisioner over the application's clients.
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::clone(&state.store),
            state.voice.clone(),
            state.telephony.clone(),
            ProvisionSettings::from_config(&state.config),
        )
    }

    fn voice(&self) -> Result<Arc<dyn VoicePlatform>, ProvisionError> {
        self.voice
            .clone()
            .ok_or(ProvisionError::NotConfigured("Vapi not configured"))
    }

    /// Create a receptionist with its assistant and inbound number.
    ///
    /// # Errors
    ///
    /// Validation and account errors before any remote call; platform or
    /// storage errors after compensating every completed step.
    pub async fn provision(
        &self,
        user_id: &UserId,
        request: &ProvisionRequest,
        now: DateTime<Utc>,
    ) -> Result<Receptionist, ProvisionError> {
        let name = required("name", &request.name)?;
        let phone_number = normalize_phone(&request.phone_number)?;
        let area_code = non_blank(request.area_code.clone());

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(DeskError::SubscriptionRequired)?;
        if !user.is_active() {
            return Err(DeskError::SubscriptionRequired.into());
        }
        let calendar_id = non_blank(request.calendar_id.clone())
            .or_else(|| user.calendar_id.clone())
            .filter(|_| user.has_calendar())
            .ok_or(DeskError::CalendarNotConnected)?;

        let voice = self.voice()?;
        let prompt = build_prompt(&PromptInput::bare(&name, &phone_number, &calendar_id));
        let mut saga = Saga::new();

        let mut tool_ids = Vec::new();
        for tool in calendar_tools(&calendar_id, &self.settings.time_zone) {
            match voice.create_tool(&tool).await {
                Ok(created) => {
                    let undo_voice = Arc::clone(&voice);
                    let tool_id = created.id.clone();
                    saga.push("delete_tool", move || {
                        async move {
                            undo_voice
                                .delete_tool(&tool_id)
                                .await
                                .map_err(|e| e.to_string())
                        }
                        .boxed()
                    });
                    tool_ids.push(created.id);
                }
                Err(e) => {
                    saga.compensate().await;
                    return Err(ProvisionError::CalendarTools(e));
                }
            }
        }

        let assistant_request = AssistantRequest::receptionist(
            &name,
            &prompt,
            tool_ids,
            self.settings.server_url.clone(),
            self.settings.server_secret.clone(),
        );
        let assistant = match voice.create_assistant(&assistant_request).await {
            Ok(assistant) => assistant,
            Err(source) => {
                saga.compensate().await;
                return Err(ProvisionError::Voice {
                    step: "create_assistant",
                    source,
                });
            }
        };
        {
            let undo_voice = Arc::clone(&voice);
            let assistant_id = assistant.id.clone();
            saga.push("delete_assistant", move || {
                async move {
                    undo_voice
                        .delete_assistant(&assistant_id)
                        .await
                        .map_err(|e| e.to_string())
                }
                .boxed()
            });
        }

        let mut phone = match voice.create_phone_number(area_code.as_deref()).await {
            Ok(phone) => phone,
            Err(e) => {
                saga.compensate().await;
                return Err(if e.is_number_limit() {
                    ProvisionError::PhoneLimit(e)
                } else {
                    ProvisionError::Voice {
                        step: "create_phone_number",
                        source: e,
                    }
                });
            }
        };
        {
            let undo_voice = Arc::clone(&voice);
            let phone_id = phone.id.clone();
            saga.push("delete_phone_number", move || {
                async move {
                    undo_voice
                        .delete_phone_number(&phone_id)
                        .await
                        .map_err(|e| e.to_string())
                }
                .boxed()
            });
        }

        if request.wait_for_number {
            for _ in 0..self.settings.poll_attempts {
                if phone.is_ready() {
                    break;
                }
                tokio::time::sleep(self.settings.poll_interval).await;
                match voice.get_phone_number(&phone.id).await {
                    Ok(latest) => phone = latest,
                    Err(e) => {
                        tracing::debug!(phone_number_id = %phone.id, error = %e, "Phone number poll failed");
                    }
                }
            }
            if !phone.is_ready() {
                tracing::warn!(phone_number_id = %phone.id, "Phone number not ready after polling");
            }
        }

        if let Err(source) = voice.attach_phone_number(&phone.id, &assistant.id).await {
            saga.compensate().await;
            return Err(ProvisionError::Voice {
                step: "attach_phone_number",
                source,
            });
        }

        let mut receptionist = Receptionist::new(*user_id, name, phone_number, now);
        receptionist.calendar_id = Some(calendar_id);
        receptionist.vapi_assistant_id = Some(assistant.id.clone());
        receptionist.vapi_phone_number_id = Some(phone.id.clone());
        receptionist.inbound_phone_number = phone.number.clone();
        receptionist.status = ReceptionistStatus::Active;
        receptionist.applied_prompt_sha256 = Some(sha256_hex(&prompt));

        if let Err(e) = self.store.insert_receptionist(&receptionist).await {
            saga.compensate().await;
            return Err(e.into());
        }
        saga.complete();

        match self.store.mark_onboarding_complete(user_id, now).await {
            Ok(true) => tracing::info!(user_id = %user_id, "Onboarding completed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to mark onboarding complete"),
        }

        tracing::info!(
            receptionist_id = %receptionist.id,
            user_id = %user_id,
            assistant_id = %assistant.id,
            phone_number_id = %phone.id,
            "Receptionist provisioned"
        );
        Ok(receptionist)
    }

    /// Delete a receptionist and, best effort, its remote resources.
    ///
    /// # Errors
    ///
    /// Only the row delete can fail.
    pub async fn decommission(&self, receptionist: &Receptionist) -> Result<(), ProvisionError> {
        if let Some(voice) = &self.voice {
            if let Some(phone_id) = &receptionist.vapi_phone_number_id {
                if let Err(e) = voice.delete_phone_number(phone_id).await {
                    tracing::warn!(phone_number_id = %phone_id, error = %e, "Failed to delete phone number");
                }
            }
            if let Some(assistant_id) = &receptionist.vapi_assistant_id {
                if let Err(e) = voice.delete_assistant(assistant_id).await {
                    tracing::warn!(assistant_id = %assistant_id, error = %e, "Failed to delete assistant");
                }
            }
        }
        if let (Some(telephony), Some(sid)) =
            (&self.telephony, &receptionist.twilio_phone_number_sid)
        {
            if let Err(e) = telephony.release_number(sid).await {
                tracing::warn!(number_sid = %sid, error = %e, "Failed to release Twilio number");
            }
        }

        self.store.delete_receptionist(&receptionist.id).await?;
        tracing::info!(receptionist_id = %receptionist.id, "Receptionist deleted");
        Ok(())
    }

    /// Push the current full prompt to the assistant unless it is already live.
    ///
    /// # Errors
    ///
    /// `NoAssistant` without a linked assistant, platform or storage errors otherwise.
    pub async fn apply_prompt(
        &self,
        receptionist: &Receptionist,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, ProvisionError> {
        let assistant_id = receptionist
            .vapi_assistant_id
            .as_deref()
            .ok_or(ProvisionError::NoAssistant)?;

        let config = self.store.get_config(&receptionist.id).await?;
        let prompt = build_prompt(&PromptInput::for_receptionist(receptionist, &config, false));
        let digest = sha256_hex(&prompt);

        if receptionist.applied_prompt_sha256.as_deref() == Some(digest.as_str()) {
            tracing::debug!(receptionist_id = %receptionist.id, "Prompt unchanged");
            return Ok(ApplyOutcome::Unchanged);
        }

        self.voice()?
            .update_assistant_prompt(assistant_id, &prompt)
            .await
            .map_err(|source| ProvisionError::Voice {
                step: "update_assistant_prompt",
                source,
            })?;

        let mut updated = receptionist.clone();
        updated.applied_prompt_sha256 = Some(digest);
        updated.updated_at = now;
        self.store.update_receptionist(&updated).await?;

        tracing::info!(receptionist_id = %receptionist.id, chars = prompt.chars().count(), "Prompt applied");
        Ok(ApplyOutcome::Applied {
            char_count: prompt.chars().count(),
        })
    }

    /// Buy a local number for a receptionist that answers through the voice server.
    ///
    /// # Errors
    ///
    /// Configuration, availability, platform or storage errors. A number bought
    /// but not stored is released again.
    pub async fn provision_twilio_number(
        &self,
        receptionist: &Receptionist,
        area_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Receptionist, ProvisionError> {
        let area_code = area_code.trim();
        if area_code.len() != 3 || !area_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeskError::invalid("area_code", "must be three digits").into());
        }
        if receptionist.twilio_phone_number_sid.is_some() {
            return Err(ProvisionError::AlreadyHasNumber);
        }

        let telephony = self
            .telephony
            .clone()
            .ok_or(ProvisionError::NotConfigured("Twilio not configured"))?;
        let voice_url = self.settings.twilio_voice_url.clone().ok_or(
            ProvisionError::NotConfigured(
                "TWILIO_WEBHOOK_BASE_URL must be set for Twilio provisioning.",
            ),
        )?;

        let number = telephony
            .search_local_number(area_code)
            .await?
            .ok_or_else(|| ProvisionError::NoNumberAvailable(area_code.to_string()))?;
        let purchased = telephony.purchase_number(&number, &voice_url).await?;

        let mut updated = receptionist.clone();
        updated.twilio_phone_number_sid = Some(purchased.sid.clone());
        updated.twilio_phone_number = Some(purchased.phone_number.clone());
        updated.updated_at = now;

        if let Err(e) = self.store.update_receptionist(&updated).await {
            if let Err(release) = telephony.release_number(&purchased.sid).await {
                tracing::warn!(number_sid = %purchased.sid, error = %release, "Failed to release unsaved Twilio number");
            }
            return Err(e.into());
        }

        tracing::info!(
            receptionist_id = %receptionist.id,
            phone_number = %purchased.phone_number,
            "Twilio number provisioned"
        );
        Ok(updated)
    }
}
